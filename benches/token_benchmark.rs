use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use levelup_tracker::config::Config;
use levelup_tracker::models::exercise::DEFAULT_IMAGE_URL;
use levelup_tracker::models::user::UserExercise;
use levelup_tracker::models::{
    Exercise, ExerciseCategory, ExperienceLevel, Recommendation, Recommendations,
};
use levelup_tracker::services::entitlements::merge_overlay;
use levelup_tracker::services::{TokenIssuer, TokenKind};

fn benchmark_tokens(c: &mut Criterion) {
    let issuer = TokenIssuer::new(&Config::test_default());
    let token = issuer
        .issue_access("benchmark-user")
        .expect("Failed to issue token")
        .token;

    let mut group = c.benchmark_group("tokens");

    group.bench_function("issue_access", |b| {
        b.iter(|| issuer.issue_access(black_box("benchmark-user")))
    });

    group.bench_function("verify_access", |b| {
        b.iter(|| issuer.verify(TokenKind::Access, black_box(&token)))
    });

    group.finish();
}

fn benchmark_overlay(c: &mut Criterion) {
    let now = Utc::now();
    let rec = Recommendation {
        weight: Some(40.0),
        reps: Some(10.0),
        sets: Some(3.0),
        ..Recommendation::default()
    };
    let exercise = Exercise {
        id: "bench".to_string(),
        name: "Bench Press".to_string(),
        description: "Flat barbell press".to_string(),
        target: vec!["Chest".to_string(), "Triceps".to_string()],
        image_url: DEFAULT_IMAGE_URL.to_string(),
        category: ExerciseCategory::Strength,
        exercise_type: "strength".to_string(),
        measurement_type: "weight_reps".to_string(),
        recommendations: Recommendations {
            beginner: Some(rec.clone()),
            intermediate: Some(rec.clone()),
            advanced: Some(rec),
        },
        user: None,
        is_default: true,
        imported_from: None,
        created_at: now,
        updated_at: now,
    };
    let overlay = UserExercise {
        name: Some("My Bench".to_string()),
        recommendation: Some(Recommendation {
            weight: Some(50.0),
            ..Recommendation::default()
        }),
        ..UserExercise::new("bench")
    };

    c.bench_function("merge_overlay", |b| {
        b.iter(|| {
            merge_overlay(
                black_box(exercise.clone()),
                Some(black_box(&overlay)),
                ExperienceLevel::Beginner,
            )
        })
    });
}

criterion_group!(benches, benchmark_tokens, benchmark_overlay);
criterion_main!(benches);
