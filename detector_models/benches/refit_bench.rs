use criterion::{black_box, criterion_group, criterion_main, Criterion};
use detector_models::hits::planar_hit_error;
use detector_models::navigation::trace_layers;
use detector_models::DetectorSetup;
use refit_core::providers::Geometry;
use refit_core::types::{DetId, GlobalVector, RecHit, StateCov, Track, TrajectoryState};
use refit_core::{PropagationDirection, Refitter, RefitterConfig};

fn make_track(setup: &DetectorSetup, phi: f64) -> Option<Track> {
    let vertex = TrajectoryState::new(
        DetId::tracker(0),
        GlobalVector::zeros(),
        GlobalVector::new(5.0 * phi.cos(), 5.0 * phi.sin(), 1.0),
        1.0,
        StateCov::identity() * 1e-12,
    );
    let truth = setup.helix_propagator(PropagationDirection::AlongMomentum);
    let crossings = trace_layers(setup.barrel(), &truth, &vertex, setup.barrel().tracker_layers());
    let (first, last) = (crossings.first()?, crossings.last()?);
    let hits = crossings
        .iter()
        .filter_map(|c| {
            let s = setup.barrel().surface(c.det_id)?;
            Some(RecHit::new(c.det_id, c.position, planar_hit_error(&s, 20e-6, 100e-6)))
        })
        .collect();
    let boundary = |c: &TrajectoryState| TrajectoryState {
        covariance: StateCov::identity() * 1e-4,
        ..c.clone()
    };
    Some(Track {
        hits,
        innermost_state: Some(boundary(first)),
        outermost_state: Some(boundary(last)),
        inner_det_id: first.det_id,
        outer_det_id: last.det_id,
    })
}

fn bench_refit(c: &mut Criterion) {
    let setup = DetectorSetup::default();
    let mut group = c.benchmark_group("refit");

    for (name, config) in [
        ("full_fit", RefitterConfig::default()),
        (
            "predictions_only",
            RefitterConfig {
                predictions_only: true,
                ..Default::default()
            },
        ),
    ] {
        let mut refitter = Refitter::new(config);
        if refitter.set_services(&setup).is_err() {
            continue;
        }
        let tracks: Vec<Track> = (0..20)
            .filter_map(|i| make_track(&setup, i as f64 * 0.3))
            .collect();
        group.bench_function(format!("{name}_{}_tracks", tracks.len()), |b| {
            b.iter(|| {
                for track in &tracks {
                    black_box(refitter.refit_track(track));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_refit);
criterion_main!(benches);
