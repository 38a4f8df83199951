//! Bundle adjustment of a synthetic ring scene.
//!
//! 1. Generate a noisy reconstruction from known cameras and points
//! 2. Perturb poses, focal length and landmarks
//! 3. Refine everything with the sparse backend, then with the dense one
//!
//! Run with: `RUST_LOG=info cargo run -p sfm --example synthetic_ba`

use anyhow::Result;
use sfm::prelude::*;
use sfm::synthetic::{
    build_reconstruction, landmark_cloud, perturb_point, perturb_pose, ring_poses,
    UniformPixelNoise,
};

const SEED: u64 = 42;

fn perturbed(gt: &Reconstruction) -> Result<Reconstruction> {
    let mut scene = gt.clone();
    for (i, pose) in scene.poses.values_mut().enumerate() {
        *pose = perturb_pose(pose, 0.02, 0.05, SEED, i);
    }
    for intr in scene.intrinsics.values_mut() {
        let mut params = intr.model.params();
        params[0] *= 1.03;
        intr.model = CameraModel::from_params(intr.model.kind(), &params)?;
    }
    for (j, landmark) in scene.landmarks.values_mut().enumerate() {
        landmark.position = perturb_point(&landmark.position, 0.03, SEED, j);
    }
    Ok(scene)
}

fn run(label: &str, gt: &Reconstruction, solver: SolverOptions) -> Result<()> {
    let mut scene = perturbed(gt)?;
    let before = scene.reprojection_errors();

    let adjuster = BundleAdjuster::new(BundleAdjustmentOptions {
        solver,
        robust_loss: RobustLoss::Huber { scale: 2.0 },
        gauge: GaugeAnchor::FirstPose,
    });
    let report = adjuster.adjust(&mut scene, RefineOptions::ALL)?;
    let after = scene.reprojection_errors();

    println!("--- {label} ---");
    println!("{}", report.stats);
    if let Some(summary) = &report.summary {
        println!("{}", summary.full_report());
    }
    println!(
        "reprojection rms: {:.4} px -> {:.4} px (max {:.4} px)\n",
        before.rms, after.rms, after.max
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let camera = Intrinsic::new(
        1280,
        960,
        CameraModel::PinholeBrownT2 {
            focal: 1000.0,
            ppx: 640.0,
            ppy: 480.0,
            k1: -0.08,
            k2: 0.01,
            k3: 0.0,
            t1: 0.0005,
            t2: -0.0003,
        },
    );
    let gt = build_reconstruction(
        camera,
        &ring_poses(12, 8.0, 1.5),
        &landmark_cloud(150, 1.5, SEED),
        UniformPixelNoise::new(SEED, 0.5),
    );
    println!(
        "synthetic scene: {} views, {} landmarks, {} observations\n",
        gt.views.len(),
        gt.landmarks.len(),
        gt.num_observations()
    );

    run("sparse", &gt, SolverOptions::sparse())?;
    run("dense", &gt, SolverOptions::dense())?;

    log::info!(
        "options as json: {}",
        serde_json::to_string(&BundleAdjustmentOptions::default())?
    );
    Ok(())
}
