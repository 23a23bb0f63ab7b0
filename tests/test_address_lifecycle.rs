mod helpers;

use chrono::Duration;
use helpers::*;
use inbound_health::application::services::validation_service::{
    validation_subject, VALIDATION_EMAIL_JOB,
};
use inbound_health::domain::entities::{InboundAddress, Marketplace, ValidationStatus};
use inbound_health::domain::errors::DomainError;
use std::sync::Arc;
use tokio_test::assert_ok;

async fn provision(h: &Harness, codes: &[&str]) -> (String, Vec<InboundAddress>) {
    let requested: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    let connection = h
        .provisioner
        .ensure_connection("T1", Marketplace::Amazon, &requested)
        .await
        .unwrap();
    let addresses = h.provisioner.list_addresses(&connection.id).await.unwrap();
    (connection.id, addresses)
}

#[tokio::test]
async fn test_regenerate_token_issues_new_pending_address() {
    let h = Harness::new().await;
    let (connection_id, addresses) = provision(&h, &["FR"]).await;
    let original = addresses[0].clone();

    // Validate first so the reset to PENDING is observable
    h.validation
        .record_inbound_message(
            &original.email,
            Some(&validation_subject(&original.token)),
            base_time(),
        )
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(1));
    let rotated = assert_ok!(h.validation.regenerate_token(&original.id).await);

    assert_eq!(rotated.id, original.id);
    assert_ne!(rotated.token, original.token);
    assert_ne!(rotated.email, original.email);
    assert_eq!(rotated.validation_status, ValidationStatus::Pending);
    assert!(rotated.validated_at.is_none());

    let stored = h.provisioner.list_addresses(&connection_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token, rotated.token);
}

#[tokio::test]
async fn test_retired_token_no_longer_routes() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR"]).await;
    let original = addresses[0].clone();

    h.validation.regenerate_token(&original.id).await.unwrap();

    let result = h
        .validation
        .record_inbound_message(&original.email, None, base_time())
        .await;
    assert!(matches!(result, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_regenerated_tokens_are_never_reused() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR"]).await;
    let address_id = addresses[0].id.clone();

    let mut seen = vec![addresses[0].token.clone()];
    for _ in 0..10 {
        let rotated = h.validation.regenerate_token(&address_id).await.unwrap();
        assert!(!seen.contains(&rotated.token));
        seen.push(rotated.token);
    }
}

#[tokio::test]
async fn test_regenerate_unknown_address_is_not_found() {
    let h = Harness::new().await;
    let result = h.validation.regenerate_token("missing").await;
    assert!(matches!(result, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_self_test_message_validates_address() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR", "DE"]).await;
    let fr = addresses.iter().find(|a| a.country == "FR").unwrap();

    let received_at = base_time() + Duration::minutes(3);
    let updated = assert_ok!(
        h.validation
            .record_inbound_message(
                &fr.email,
                Some(&validation_subject(&fr.token)),
                received_at
            )
            .await
    );

    assert_eq!(updated.validation_status, ValidationStatus::Validated);
    assert_eq!(updated.validated_at, Some(received_at));
    assert_eq!(updated.last_inbound_at, Some(received_at));
}

#[tokio::test]
async fn test_ordinary_message_only_records_arrival() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR"]).await;
    let fr = &addresses[0];

    let received_at = base_time() + Duration::minutes(5);
    let updated = h
        .validation
        .record_inbound_message(&fr.email, Some("Order 123-456 shipped"), received_at)
        .await
        .unwrap();

    assert_eq!(updated.validation_status, ValidationStatus::Pending);
    assert_eq!(updated.last_inbound_at, Some(received_at));

    // Out-of-order delivery does not move the timestamp backwards
    let older = h
        .validation
        .record_inbound_message(&fr.email, None, received_at - Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(older.last_inbound_at, Some(received_at));
}

#[tokio::test]
async fn test_record_inbound_rejects_foreign_addresses() {
    let h = Harness::new().await;
    provision(&h, &["FR"]).await;

    let malformed = h
        .validation
        .record_inbound_message("support@inbound.test", None, base_time())
        .await;
    assert!(matches!(malformed, Err(DomainError::FormatInvalid(_))));

    let unknown = h
        .validation
        .record_inbound_message("amazon.T1.fr.zzzzzz@inbound.test", None, base_time())
        .await;
    assert!(matches!(unknown, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_manual_configuration_counts_as_validated() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR"]).await;

    let updated = h
        .validation
        .mark_manually_configured(
            &addresses[0].id,
            "ops@example.com",
            Some("Forwarding set up in Seller Central".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(updated.validation_status, ValidationStatus::Validated);
    let manual = updated.manual_configuration.unwrap();
    assert_eq!(manual.configured_by, "ops@example.com");
    assert_eq!(manual.configured_at, base_time());

    let blank = h
        .validation
        .mark_manually_configured(&addresses[0].id, "  ", None)
        .await;
    assert!(matches!(blank, Err(DomainError::ValidationError(_))));
}

#[tokio::test]
async fn test_mark_validation_failed_records_error() {
    let h = Harness::new().await;
    let (_, addresses) = provision(&h, &["FR"]).await;

    let failed = h
        .validation
        .mark_validation_failed(&addresses[0].id, "Self-test not received within 1h")
        .await
        .unwrap();

    assert_eq!(failed.validation_status, ValidationStatus::Failed);
    assert_eq!(
        failed.validation_error.as_deref(),
        Some("Self-test not received within 1h")
    );
}

#[tokio::test]
async fn test_send_validation_email_enqueues_unvalidated_addresses() {
    let h = Harness::new().await;
    let (connection_id, addresses) = provision(&h, &["FR", "DE"]).await;
    let de = addresses.iter().find(|a| a.country == "DE").unwrap();
    h.validation
        .mark_manually_configured(&de.id, "ops", None)
        .await
        .unwrap();

    let dispatch = assert_ok!(h.validation.send_validation_email(&connection_id, None).await);

    assert_eq!(dispatch.sent, 1);
    assert_eq!(dispatch.results.len(), 1);
    assert_eq!(dispatch.results[0].country, "FR");
    assert!(dispatch.results[0].job_id.is_some());
    assert_eq!(count_jobs(&h.db(), VALIDATION_EMAIL_JOB).await, 1);
}

#[tokio::test]
async fn test_send_validation_email_for_single_country() {
    let h = Harness::new().await;
    let (connection_id, _) = provision(&h, &["FR", "DE"]).await;

    let dispatch = h
        .validation
        .send_validation_email(&connection_id, Some("de"))
        .await
        .unwrap();

    assert_eq!(dispatch.sent, 1);
    assert_eq!(dispatch.results[0].country, "DE");
}

#[tokio::test]
async fn test_send_validation_email_unknown_connection() {
    let h = Harness::new().await;
    let result = h.validation.send_validation_email("missing", None).await;
    assert!(matches!(result, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_send_validation_email_reports_queue_failures() {
    let h = Harness::with(HarnessOptions {
        queue: Some(Arc::new(FailingTaskQueue)),
        ..Default::default()
    })
    .await;
    let (connection_id, _) = provision(&h, &["FR"]).await;

    let dispatch = h
        .validation
        .send_validation_email(&connection_id, None)
        .await
        .unwrap();

    assert_eq!(dispatch.sent, 0);
    assert!(dispatch.results[0].job_id.is_none());
    assert!(dispatch.results[0].error.is_some());
}
