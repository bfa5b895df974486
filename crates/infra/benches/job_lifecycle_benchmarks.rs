use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use std::sync::Arc;
use synopsi_core::{
    ArticleId, DEFAULT_MAX_ATTEMPTS, Job, SummaryKind, SummaryLength, SummaryTarget, UserId,
};
use synopsi_infra::content::InMemoryContentDirectory;
use synopsi_infra::jobs::{GeneratedSummary, JobService, JobSettings};
use synopsi_infra::store::{InMemoryJobStore, JobStore};
use synopsi_infra::worker::UnconfiguredWorkerGateway;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn service(content: Arc<InMemoryContentDirectory>) -> JobService {
    JobService::new(
        InMemoryJobStore::arc(),
        content,
        Arc::new(UnconfiguredWorkerGateway),
        JobSettings::default(),
    )
}

/// Submit a job and deliver its success callback.
fn bench_submit_and_complete(c: &mut Criterion) {
    let rt = runtime();
    let content = InMemoryContentDirectory::arc();
    let service = service(content.clone());

    c.bench_function("submit_and_complete", |b| {
        b.iter(|| {
            let article = ArticleId::new();
            content.add_article(article).unwrap();
            rt.block_on(async {
                let job = service
                    .submit(
                        SummaryTarget::shared(article),
                        SummaryKind::Brief,
                        SummaryLength::Medium,
                    )
                    .await
                    .unwrap();
                let summary = service
                    .on_success(
                        job.id,
                        GeneratedSummary {
                            text: "benchmark summary".to_string(),
                            model_version: "bench".to_string(),
                            token_count: Some(64),
                        },
                    )
                    .await
                    .unwrap();
                black_box(summary);
            });
        });
    });

    rt.block_on(service.wait_for_dispatches());
}

/// Listing the queue in dispatch order as it grows.
fn bench_list_queued(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("list_queued");

    for queued in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*queued as u64));
        group.bench_with_input(BenchmarkId::new("queued_jobs", queued), queued, |b, &size| {
            let store = InMemoryJobStore::new();
            rt.block_on(async {
                for i in 0..size {
                    let target = if i % 3 == 0 {
                        SummaryTarget::for_user(ArticleId::new(), UserId::new())
                    } else {
                        SummaryTarget::shared(ArticleId::new())
                    };
                    let job = Job::queued(
                        target,
                        SummaryKind::Brief,
                        SummaryLength::Short,
                        DEFAULT_MAX_ATTEMPTS,
                        Utc::now(),
                    );
                    store.insert_job(job).await.unwrap();
                }
            });

            b.iter(|| black_box(rt.block_on(store.list_queued()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_submit_and_complete, bench_list_queued);
criterion_main!(benches);
