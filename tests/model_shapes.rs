use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;

use like_xception::model::XceptionLikeConfig;

type TestBackend = NdArray<f32>;

#[test]
fn every_block_shortcut_matches_main_path() {
    let device = Default::default();
    let model = XceptionLikeConfig::new().init::<TestBackend>(&device);
    assert_eq!(model.num_blocks(), 5);

    let input = Tensor::<TestBackend, 4>::random([1, 3, 180, 180], Distribution::Uniform(0.0, 255.0), &device);
    let mut x = model.stem.forward(input);
    assert_eq!(x.dims(), [1, 32, 176, 176]);

    let expected = [(32, 88), (64, 44), (128, 22), (256, 11), (512, 6)];
    for (block, (channels, side)) in model.blocks.iter().zip(expected) {
        let (main, residual) = block.paths(x.clone());
        assert_eq!(main.dims(), [1, channels, side, side]);
        assert_eq!(residual.dims(), main.dims());
        x = block.forward(x);
    }
}

#[test]
fn default_model_outputs_one_probability_per_image() {
    let device = Default::default();
    let model = XceptionLikeConfig::new().init::<TestBackend>(&device);

    let input = Tensor::<TestBackend, 4>::random([2, 3, 180, 180], Distribution::Uniform(0.0, 255.0), &device);
    let probs = model.forward(input);
    assert_eq!(probs.dims(), [2, 1]);

    let values: Vec<f32> = probs.into_data().to_vec().unwrap();
    assert!(values.iter().all(|p| (0.0..=1.0).contains(p)));
}
