use criterion::{criterion_group, criterion_main, Criterion};

use service::enrollment::EnrollmentManagement;
use service::hackathon::{HackathonManagement, HackathonQueryOptions, HackathonRequest};
use service::context::ManagementContext;
use service::pagination::Pagination;

fn bench_hackathon_listing(c: &mut Criterion) {
    let ctx = ManagementContext::in_memory();
    let hackathons = HackathonManagement::new(ctx.clone());
    let enrollments = EnrollmentManagement::new(ctx.clone());

    let rt = tokio::runtime::Runtime::new().unwrap();
    let hackathon = rt
        .block_on(hackathons.create_hackathon(&HackathonRequest { name: "bench".into(), ..Default::default() }, "creator"))
        .unwrap();
    for i in 0..500 {
        let _ = rt.block_on(enrollments.create_enrollment(&hackathon, &format!("user{i}"), None));
    }
    for i in 0..200 {
        let request = HackathonRequest { name: format!("hack{i}"), ..Default::default() };
        let _ = rt.block_on(hackathons.create_hackathon(&request, &format!("creator{i}")));
    }

    c.bench_function("enrollment_segmented_page", |b| {
        b.iter(|| {
            rt.block_on(enrollments.list_paginated_enrollments("bench", None, &Pagination::with_top(Some(50)))).unwrap();
        });
    });

    c.bench_function("hackathon_cached_page", |b| {
        let options = HackathonQueryOptions { pagination: Pagination::with_top(Some(20)), ..Default::default() };
        b.iter(|| {
            rt.block_on(hackathons.list_paginated_hackathons(&options)).unwrap();
        });
    });
}

criterion_group!(benches, bench_hackathon_listing);
criterion_main!(benches);
