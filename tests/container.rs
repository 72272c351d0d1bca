use bnn_params::{
    BnnErr, ConfigErr, Container, Conv1d, Conv2d, Conv3d, ConvGeometry, Covariance, LayerOptions,
    Linear, Module, Parameterized, Parametrization,
};
use ndarray::{Array1, ArrayD, IxDyn};
use rand::{SeedableRng, rngs::StdRng};

const IN: usize = 50;
const OUT: usize = 20;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_allclose(actual: f32, desired: f32, atol: f32, rtol: f32) {
    assert!(
        (actual - desired).abs() <= atol + rtol * desired.abs(),
        "{actual} is not close to {desired}"
    );
}

/// Wraps plain (deterministic) layers of every kind, the convolutions inside a nested block.
fn plain_model() -> Container {
    let options = LayerOptions::default();
    let convs = Container::default()
        .with("c1", Conv1d::new(IN, OUT, ConvGeometry::uniform(1), options).unwrap())
        .unwrap()
        .with("c2", Conv2d::new(IN, OUT, ConvGeometry::uniform(3), options).unwrap())
        .unwrap()
        .with("c3", Conv3d::new(IN, OUT, ConvGeometry::uniform(1), options).unwrap())
        .unwrap();

    let mut model = Container::new(Parametrization::Standard);
    model
        .push("fc", Linear::new(IN, OUT, options).unwrap())
        .unwrap();
    model.push("convs", convs).unwrap();
    model
        .push_buffer("running_var", ArrayD::ones(IxDyn(&[OUT])))
        .unwrap();
    model
}

#[test]
fn reset_initializes_wrapped_plain_layers() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(4678);
    let mut model = plain_model();
    let mut bias_samples = Vec::new();

    assert!(model.cov_parameters().is_empty());

    for _ in 0..16 {
        model.reset_parameters(&mut rng).unwrap();

        for (path, layer) in model.layers() {
            let (fan_in, _) = layer.fan_in_and_fan_out().unwrap();
            let weight_std = layer.weight().std(0.);
            let expected = 1. / (fan_in as f32).sqrt();
            assert!(
                (weight_std - expected).abs() <= 0.1 + 0.1 * expected,
                "{path}: weight std {weight_std} for a fan-in of {fan_in}"
            );

            bias_samples.extend(layer.bias().unwrap().iter().copied());
        }
    }

    let bias = Array1::from(bias_samples).into_dyn();
    assert_allclose(bias.std(0.), 1., 0.1, 0.1);
    assert!(model.buffer("running_var").unwrap().iter().all(|&x| x == 1.));
}

#[test]
fn layers_are_listed_depth_first() {
    let model = plain_model();

    let paths: Vec<_> = model.layers().into_iter().map(|(path, _)| path).collect();
    assert_eq!(paths, ["fc", "convs.c1", "convs.c2", "convs.c3"]);

    let names: Vec<_> = model.mean_parameters().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names[0], "fc.weight");
    assert_eq!(names[names.len() - 1], "convs.c3.bias");
    assert_eq!(model.len(), 2);
    assert!(matches!(model.get("convs"), Some(Module::Container(_))));
}

#[test]
fn bayesian_layers_inside_a_container() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(8);
    let options = LayerOptions::default().with_cov(Covariance::low_rank(16).unwrap());

    let mut model = Container::default()
        .with("fc1", Linear::new(IN, OUT, options).unwrap())
        .unwrap()
        .with("fc2", Linear::new(OUT, 1, LayerOptions::default()).unwrap())
        .unwrap();
    model.reset_parameters(&mut rng).unwrap();

    let cov: Vec<_> = model.cov_parameters().into_iter().map(|(n, _)| n).collect();
    assert_eq!(cov, ["fc1.cov.weight", "fc1.cov.bias"]);
    assert_eq!(model.num_cov_parameters(), 16 * (IN * OUT + OUT));
    assert_eq!(model.num_mean_parameters(), IN * OUT + OUT + OUT + 1);

    let fc1 = model.layer("fc1").unwrap();
    let cov_std = 1. / (IN as f32).sqrt() / ((IN * OUT + OUT) as f32).sqrt();
    let cov_weight = fc1.params().cov().unwrap().weight();
    assert_allclose(cov_weight.std(0.), cov_std, 0., 0.1);
}

#[test]
fn failing_layer_aborts_the_reset() {
    let mut rng = StdRng::seed_from_u64(0);
    let options = LayerOptions::default()
        .with_bias(false)
        .with_cov(Covariance::factorized());

    let mut model = Container::default()
        .with("empty", Linear::new(IN, 0, options).unwrap())
        .unwrap()
        .with("fc", Linear::new(IN, OUT, LayerOptions::default()).unwrap())
        .unwrap();

    let err = model.reset_parameters(&mut rng).unwrap_err();
    assert!(matches!(
        err,
        BnnErr::Config(ConfigErr::NoMeanParameters { .. })
    ));
    assert!(model.layer("fc").unwrap().weight().iter().all(|&x| x == 0.));
}

#[test]
fn same_seed_same_model() {
    let mut first = plain_model();
    let mut second = plain_model();

    first.reset_parameters(&mut StdRng::seed_from_u64(21)).unwrap();
    second.reset_parameters(&mut StdRng::seed_from_u64(21)).unwrap();

    assert_eq!(first.mean_parameters(), second.mean_parameters());
}
