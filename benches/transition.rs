use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use prox_mcmc::core::{Kernel, KernelConfig};
use prox_mcmc::likelihood::GaussianLikelihood;
use prox_mcmc::operator::CircularConvolution;
use prox_mcmc::posterior::{GradientTarget, Posterior};
use prox_mcmc::prior::{MoreauYosida, ProxConfig, TotalVariation};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::hint::black_box;

fn posterior(n: usize) -> Posterior<CircularConvolution, TotalVariation> {
    let shape = (n, n);
    let y = Array2::from_shape_fn(shape, |(i, j)| if (i / 8 + j / 8) % 2 == 0 { 1.0 } else { 0.0 });
    let blur = CircularConvolution::uniform(shape, 5).unwrap();
    let likelihood = GaussianLikelihood::new(blur, y, 0.05).unwrap();
    let prox = ProxConfig::from_fraction(0.99, likelihood.lipschitz(), 25).unwrap();
    let prior = MoreauYosida::new(TotalVariation::new(), 10.0, prox).unwrap();
    Posterior::new(likelihood, prior)
}

fn bench_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition");
    group.sample_size(20);

    for &n in &[32usize, 64, 128] {
        let target = posterior(n);
        group.bench_with_input(BenchmarkId::new("grad_log_prob", n), &n, |b, _| {
            let x = target.likelihood().observation().clone();
            b.iter(|| black_box(target.grad_log_prob(black_box(&x))).unwrap())
        });

        for (name, config) in [
            ("langevin", KernelConfig::langevin()),
            ("chebyshev_s10", KernelConfig::chebyshev(10)),
        ] {
            let mut kernel = config.build(target.lipschitz(), (n, n)).unwrap();
            let mut rng = SmallRng::seed_from_u64(0);
            let mut x = target.likelihood().observation().clone();
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| kernel.transition(&target, &mut x, &mut rng).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_transition);
criterion_main!(benches);
