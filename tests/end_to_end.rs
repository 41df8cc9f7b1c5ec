use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Point3, Vector3};
use seqtrace::{
    aperture::Aperture,
    builder::{build_simple_optical_system, SurfaceDescriptor, SystemBuilder},
    coordinates::{CoordinateTree, LocalTransform, TransformOrder},
    degree,
    material::{AnisotropicMaterial, GrinIndex, GrinMaterial, Material, ParabolicGrin, WaveBranch},
    millimeter, nanometer,
    ray_bundle::{Interaction, RayBundle, RayStatus},
    sampling::{Hexapolar, MeridionalFan},
    shape::{
        AsphereShape, BiconicShape, FreeformShape, SagFn, Shape, SurfaceShape, XyPolynomialShape,
        XyTerm,
    },
    trace, OpticalSystem, Propagator, Sequence, TraceConfig,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn biconvex_lens() -> (OpticalSystem, Sequence) {
    build_simple_optical_system(&[
        SurfaceDescriptor::new("front", Some(millimeter!(100.0)), millimeter!(20.0))
            .with_index(1.5)
            .with_aperture(Aperture::circular(millimeter!(9.0)).unwrap())
            .stop(),
        SurfaceDescriptor::new("back", Some(millimeter!(-100.0)), millimeter!(5.0)).with_index(1.0),
        SurfaceDescriptor::new("image", None, millimeter!(100.0)),
    ])
    .unwrap()
}

#[test]
fn two_sphere_lens_focuses() {
    init_logger();
    let (system, sequence) = biconvex_lens();
    let fan = MeridionalFan::new(millimeter!(9.0), 11).unwrap();
    let bundle = RayBundle::new_collimated(&fan, millimeter!(0.0), nanometer!(587.6)).unwrap();
    let bundles = Propagator::default()
        .trace(&system, &sequence, bundle)
        .unwrap();
    assert_eq!(bundles.len(), 3);
    let image = &bundles[2];
    assert_eq!(image.len(), 11);
    assert_eq!(image.nr_of_valid_rays(), 11);
    // image plane is ~0.84 mm behind the paraxial focus, marginal rays suffer from spherical aberration
    let centroid = image.centroid().unwrap();
    assert_abs_diff_eq!(centroid.y.value, 0.0, epsilon = 1e-12);
    assert!(image.rms_spot_radius().unwrap() < millimeter!(0.3));
    assert!(image.positions().iter().all(|p| p.y.abs() < millimeter!(0.5)));
    for p in image.positions() {
        assert_abs_diff_eq!(p.z.value, 0.0, epsilon = 1e-15);
    }
}

#[test]
fn paraxial_back_focal_length() {
    let (system, sequence) = biconvex_lens();
    let bundle = RayBundle::new(
        vec![millimeter!(0.0, 0.01, 0.0)],
        vec![Vector3::z()],
        nanometer!(587.6),
    )
    .unwrap();
    let bundles = trace(&system, &sequence, bundle, &TraceConfig::default()).unwrap();
    let image = &bundles[2];
    let y = image.positions()[0].y.value;
    let d = image.directions()[0];
    // axis crossing measured from the rear vertex (100 mm in front of the image plane)
    let bfl = 0.1 - y * d.z / d.y;
    let n: f64 = 1.5;
    let (r1, r2, thickness) = (0.1, -0.1, 0.005);
    let power = (n - 1.0) * (1.0 / r1 - 1.0 / r2 + (n - 1.0) * thickness / (n * r1 * r2));
    let expected = (1.0 - (n - 1.0) * thickness / (n * r1)) / power;
    assert_abs_diff_eq!(bfl, expected, epsilon = 5e-6);
}

#[test]
fn vignetted_ray_stays_invalid() {
    let (system, sequence) = biconvex_lens();
    let bundle = RayBundle::new(
        vec![millimeter!(0.0, 9.5, 0.0), millimeter!(0.0, 4.0, 0.0)],
        vec![Vector3::z(), Vector3::z()],
        nanometer!(587.6),
    )
    .unwrap();
    let bundles = Propagator::default()
        .trace(&system, &sequence, bundle)
        .unwrap();
    let frozen = bundles[0].to_global(system.coordinates()).unwrap();
    for b in &bundles {
        assert_eq!(b.status()[0], RayStatus::Vignetted);
        assert_eq!(b.status()[1], RayStatus::Valid);
        let global = b.to_global(system.coordinates()).unwrap();
        assert_abs_diff_eq!(
            global.positions()[0].map(|c| c.value),
            frozen.positions()[0].map(|c| c.value),
            epsilon = 1e-15
        );
        assert_abs_diff_eq!(global.directions()[0], Vector3::z(), epsilon = 1e-15);
    }
}

#[test]
fn index_alignment() {
    let (system, sequence) = biconvex_lens();
    let pupil = Hexapolar::new(millimeter!(10.0), 3).unwrap();
    let bundle = RayBundle::new_collimated(&pupil, millimeter!(0.0), nanometer!(587.6)).unwrap();
    let nr_of_rays = bundle.len();
    let bundles = trace(&system, &sequence, bundle, &TraceConfig::default()).unwrap();
    assert_eq!(bundles.len(), sequence.len());
    assert!(bundles.iter().all(|b| b.len() == nr_of_rays));
    // outer ring (18 rays at 10 mm) is blocked by the 9 mm aperture
    assert_eq!(bundles[0].nr_of_valid_rays(), nr_of_rays - 18);
    for later in &bundles[1..] {
        assert_eq!(later.status(), bundles[0].status());
    }
}

/// Axial position (behind the rear vertex) where a ray entering at height `y` crosses the axis.
fn axis_crossing(system: &OpticalSystem, sequence: &Sequence, y: f64) -> f64 {
    let bundle = RayBundle::new(
        vec![Point3::new(millimeter!(0.0), millimeter!(y), millimeter!(0.0))],
        vec![Vector3::z()],
        nanometer!(587.6),
    )
    .unwrap();
    let bundles = trace(system, sequence, bundle, &TraceConfig::default()).unwrap();
    let image = &bundles[2];
    assert_eq!(image.status()[0], RayStatus::Valid);
    let d = image.directions()[0];
    0.1 - image.positions()[0].y.value * d.z / d.y
}

#[test]
fn asphere_corrects_spherical_aberration() {
    let (spherical, sequence) = biconvex_lens();
    let with_front = |coefficients: Vec<f64>| {
        let (mut system, _) = biconvex_lens();
        system
            .surface_mut("front")
            .unwrap()
            .set_shape(Shape::Asphere(AsphereShape::new(10.0, 0.0, coefficients).unwrap()));
        system
    };
    let plain = with_front(vec![]);
    let corrected = with_front(vec![0.0, -500.0]);
    let paraxial = axis_crossing(&spherical, &sequence, 0.01);
    let marginal = axis_crossing(&spherical, &sequence, 8.5);
    // a bare asphere behaves like the sphere
    assert_abs_diff_eq!(axis_crossing(&plain, &sequence, 8.5), marginal, epsilon = 1e-12);
    // positive lens: marginal rays focus in front of the paraxial focus
    assert!(marginal < paraxial);
    // a negative A4 term flattens the margin and moves the marginal focus back, the paraxial focus stays
    assert_abs_diff_eq!(axis_crossing(&corrected, &sequence, 0.01), paraxial, epsilon = 1e-7);
    let corrected_marginal = axis_crossing(&corrected, &sequence, 8.5);
    assert!(corrected_marginal > marginal);
    assert!((paraxial - corrected_marginal).abs() < paraxial - marginal);
}

fn single_surface(shape: Shape) -> (OpticalSystem, Sequence) {
    let (mut system, sequence) = build_simple_optical_system(&[
        SurfaceDescriptor::new("surface", None, millimeter!(10.0)).with_index(1.5),
        SurfaceDescriptor::new("image", None, millimeter!(5.0)),
    ])
    .unwrap();
    system.surface_mut("surface").unwrap().set_shape(shape);
    (system, sequence)
}

fn assert_oblique_hit(shape: Shape, start: Point3<f64>, direction: Vector3<f64>) {
    let kind = shape.kind();
    let (system, sequence) = single_surface(shape);
    let bundle = RayBundle::new(
        vec![start.map(|c| millimeter!(c))],
        vec![direction],
        nanometer!(587.6),
    )
    .unwrap();
    let bundles = Propagator::default()
        .trace(&system, &sequence, bundle)
        .unwrap();
    let hit = &bundles[0];
    assert_eq!(hit.status()[0], RayStatus::Valid, "{kind}");
    assert_eq!(hit.interactions()[0], Interaction::Refraction, "{kind}");
    let p = hit.positions()[0].map(|c| c.value);
    let shape = system.surface("surface").unwrap().shape();
    assert_abs_diff_eq!(p.z, shape.sag(p.x, p.y), epsilon = 1e-11);
    assert_relative_eq!(hit.wave_vectors()[0].norm(), 1.5, max_relative = 1e-12);
}

#[test]
fn oblique_rays_on_polynomial_shapes() {
    // crosses the vertex plane 15 mm off axis, outside the domain of a R = 10 mm sphere
    let start = Point3::new(0.0, 23.0, 0.0);
    let steep = Vector3::new(0.0, -0.8, 1.0);
    assert_oblique_hit(
        Shape::Asphere(AsphereShape::new(100.0, 0.0, vec![0.0, 50.0]).unwrap()),
        start,
        steep,
    );
    assert_oblique_hit(
        Shape::Biconic(BiconicShape::new(60.0, 100.0, 0.0, 0.0, vec![(0.0, 0.0)]).unwrap()),
        Point3::new(2.0, 23.0, 0.0),
        steep,
    );
    let term = XyTerm {
        x_power: 0,
        y_power: 2,
        coefficient: 0.01,
    };
    assert_oblique_hit(
        Shape::XyPolynomial(XyPolynomialShape::new(0.01, vec![term]).unwrap()),
        Point3::new(1.0, 15.0, 0.0),
        Vector3::new(0.1, -0.8, 1.0),
    );
    let sag: SagFn = Arc::new(|x: f64, y: f64| 5.0 * x * x + 8.0 * y * y + 30.0 * x * y * y);
    assert_oblique_hit(
        Shape::Freeform(FreeformShape::new(sag, None)),
        Point3::new(1.0, 12.0, 0.0),
        Vector3::new(0.05, -0.4, 1.0),
    );
}

#[test]
fn transform_round_trip() {
    let mut tree = CoordinateTree::default();
    let a = tree
        .add_child(
            tree.root(),
            "a",
            LocalTransform::new(
                millimeter!(1.0, -2.0, 30.0),
                degree!(10.0, -25.0, 40.0),
                TransformOrder::DecenterThenTilt,
            )
            .unwrap(),
        )
        .unwrap();
    let b = tree
        .add_child(
            a,
            "b",
            LocalTransform::new(
                millimeter!(-3.0, 0.5, 12.0),
                degree!(-5.0, 60.0, 0.0),
                TransformOrder::TiltThenDecenter,
            )
            .unwrap(),
        )
        .unwrap();
    tree.update().unwrap();
    let p = millimeter!(12.5, -7.0, 3.25);
    for id in [a, b] {
        let back = tree
            .local_to_global(id, &tree.global_to_local(id, &p).unwrap())
            .unwrap();
        assert_abs_diff_eq!(back.map(|c| c.value), p.map(|c| c.value), epsilon = 1e-15);
    }
}

fn rod(material: Material) -> (OpticalSystem, Sequence) {
    SystemBuilder::new()
        .with_material("rod", material)
        .surface(SurfaceDescriptor::new("entry", None, millimeter!(10.0)).with_material("rod"))
        .surface(
            SurfaceDescriptor::new("exit", Some(millimeter!(-50.0)), millimeter!(20.0))
                .with_index(1.0),
        )
        .surface(SurfaceDescriptor::new("image", None, millimeter!(30.0)))
        .build()
        .unwrap()
}

#[test]
fn grin_without_gradient_equals_homogeneous() {
    init_logger();
    let grin = GrinMaterial::new(GrinIndex::Parabolic(ParabolicGrin::new(1.5, 0.0, 0.0).unwrap()));
    let (grin_system, sequence) = rod(Material::Grin(grin));
    let (glass_system, _) = rod(Material::constant(1.5).unwrap());
    let bundle = RayBundle::new(
        vec![millimeter!(0.0, 3.0, 0.0), millimeter!(1.0, -2.0, 0.0)],
        vec![Vector3::new(0.0, -0.02, 1.0), Vector3::new(0.01, 0.03, 1.0)],
        nanometer!(587.6),
    )
    .unwrap();
    let curved = trace(&grin_system, &sequence, bundle.clone(), &TraceConfig::default()).unwrap();
    let straight = trace(&glass_system, &sequence, bundle, &TraceConfig::default()).unwrap();
    for (c, s) in curved.iter().zip(straight.iter()) {
        assert_eq!(c.status(), s.status());
        for i in 0..c.len() {
            assert_abs_diff_eq!(
                c.positions()[i].map(|v| v.value),
                s.positions()[i].map(|v| v.value),
                epsilon = 1e-9
            );
            assert_abs_diff_eq!(c.directions()[i], s.directions()[i], epsilon = 1e-9);
            assert_relative_eq!(
                c.optical_path_lengths()[i].value,
                s.optical_path_lengths()[i].value,
                max_relative = 1e-9
            );
        }
    }
}

#[test]
fn grin_rod_focuses() {
    let grin = GrinMaterial::new(GrinIndex::Parabolic(
        ParabolicGrin::new(1.6, -200.0, 0.0).unwrap(),
    ));
    let (system, sequence) = rod(Material::Grin(grin));
    let bundle = RayBundle::new(
        vec![millimeter!(0.0, 1.0, 0.0)],
        vec![Vector3::z()],
        nanometer!(587.6),
    )
    .unwrap();
    let mut config = TraceConfig::default();
    config.set_grin_step(Some(millimeter!(0.05))).unwrap();
    let bundles = Propagator::new(config)
        .trace(&system, &sequence, bundle)
        .unwrap();
    let exit = &bundles[1];
    assert_eq!(exit.status()[0], RayStatus::Valid);
    // bent towards the axis inside the rod
    assert!(exit.positions()[0].y < millimeter!(1.0));
    assert!(exit.directions()[0].y < 0.0);
}

#[test]
fn birefringent_plate_walk_off() {
    let axis = Vector3::new(0.0, 1.0, 1.0);
    let plate = |branch| {
        let crystal = AnisotropicMaterial::uniaxial(1.5, 1.7, axis)
            .unwrap()
            .with_branch(branch);
        build_simple_optical_system_with(Material::Anisotropic(crystal))
    };
    let bundle = RayBundle::new(
        vec![millimeter!(0.0, 0.0, 0.0)],
        vec![Vector3::z()],
        nanometer!(1064.0),
    )
    .unwrap();
    let (system, sequence) = plate(WaveBranch::Fast);
    let ordinary = trace(&system, &sequence, bundle.clone(), &TraceConfig::default()).unwrap();
    let (system, sequence) = plate(WaveBranch::Slow);
    let extraordinary = trace(&system, &sequence, bundle, &TraceConfig::default()).unwrap();
    // ordinary wave: no walk-off
    assert_abs_diff_eq!(ordinary[1].positions()[0].y.value, 0.0, epsilon = 1e-15);
    assert_relative_eq!(ordinary[0].wave_vectors()[0].norm(), 1.5, max_relative = 1e-12);
    // extraordinary wave: energy leaves the plate displaced, but parallel to the incident ray
    assert!(extraordinary[1].positions()[0].y.value.abs() > 1e-4);
    assert_abs_diff_eq!(extraordinary[1].directions()[0], Vector3::z(), epsilon = 1e-9);
    assert_abs_diff_eq!(
        extraordinary[0].wave_vectors()[0].normalize(),
        Vector3::z(),
        epsilon = 1e-12
    );
}

fn build_simple_optical_system_with(crystal: Material) -> (OpticalSystem, Sequence) {
    SystemBuilder::new()
        .with_material("crystal", crystal)
        .surface(SurfaceDescriptor::new("entry", None, millimeter!(5.0)).with_material("crystal"))
        .surface(SurfaceDescriptor::new("exit", None, millimeter!(10.0)).with_index(1.0))
        .build()
        .unwrap()
}

#[test]
fn optimizer_round_trip() {
    let (mut system, sequence) = biconvex_lens();
    let bundle = || {
        RayBundle::new(
            vec![Point3::new(millimeter!(0.0), millimeter!(5.0), millimeter!(0.0))],
            vec![Vector3::z()],
            nanometer!(587.6),
        )
        .unwrap()
    };
    let before = trace(&system, &sequence, bundle(), &TraceConfig::default()).unwrap();
    // a stronger front surface moves the focus towards the lens
    let c = system.get_value("surfaces/front/shape/curvature").unwrap();
    system
        .set_value("surfaces/front/shape/curvature", 1.5 * c)
        .unwrap();
    system.set_value("coordinates/image/decz", 0.09).unwrap();
    system.update().unwrap();
    let after = trace(&system, &sequence, bundle(), &TraceConfig::default()).unwrap();
    assert!(after[2].directions()[0].y < before[2].directions()[0].y);
    let image_cs = system.surface("image").unwrap().coordinate_system();
    let vertex = system
        .coordinates()
        .local_to_global(image_cs, &millimeter!(0.0, 0.0, 0.0))
        .unwrap();
    assert_abs_diff_eq!(vertex.z.value, 0.115, epsilon = 1e-15);
}
