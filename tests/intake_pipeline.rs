//! End-to-end intake behaviour with an in-memory store and a stub model.

use invoice_fraud_intake::config::AppConfig;
use invoice_fraud_intake::models::{
    BinaryModel, ClaimClassifier, ClassifierArtifacts, DiagnosisEncoder, StandardScaler,
};
use invoice_fraud_intake::storage::SqliteInvoiceStore;
use invoice_fraud_intake::types::invoice::ExtractedPayload;
use invoice_fraud_intake::{FraudStatus, IntakeError, IntakeService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Flags suspicious diagnoses; counts how often it is invoked.
struct SuspiciousFlagModel {
    calls: Arc<AtomicUsize>,
}

impl BinaryModel for SuspiciousFlagModel {
    fn name(&self) -> &str {
        "suspicious-flag"
    }

    fn predict(&self, features: &[f32]) -> anyhow::Result<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Unit scaler, so index 4 is the raw suspicious_diagnosis flag.
        Ok(i64::from(features[4] > 0.5))
    }
}

/// Refuses to score claims above a fixed amount.
struct CappedModel;

impl BinaryModel for CappedModel {
    fn name(&self) -> &str {
        "capped"
    }

    fn predict(&self, features: &[f32]) -> anyhow::Result<i64> {
        if features[0] > 9000.0 {
            anyhow::bail!("amount {} outside training range", features[0]);
        }
        Ok(0)
    }
}

fn service(upload_dir: &std::path::Path) -> (IntakeService, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = Box::new(SuspiciousFlagModel {
        calls: calls.clone(),
    });
    (service_with(upload_dir, model), calls)
}

fn service_with(upload_dir: &std::path::Path, model: Box<dyn BinaryModel>) -> IntakeService {
    let encoder = DiagnosisEncoder::new(
        vec![
            "Cancer Treatment".to_string(),
            "Flu".to_string(),
            "Surgery".to_string(),
        ],
        "Flu",
    )
    .unwrap();
    let scaler = StandardScaler::new(vec![0.0; 6], vec![1.0; 6]).unwrap();
    let artifacts = ClassifierArtifacts::new("integration", encoder, scaler, model).unwrap();

    let mut config = AppConfig::default();
    config.storage.upload_dir = upload_dir.to_path_buf();

    IntakeService::from_config(
        &config,
        ClaimClassifier::new(Arc::new(artifacts)),
        Arc::new(SqliteInvoiceStore::in_memory().unwrap()),
    )
}

#[tokio::test]
async fn classifies_every_row_and_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let (service, calls) = service(dir.path());

    let csv = "Invoice ID,Patient Name,Claim Amount,Diagnosis,Date of Service,Claim Frequency\n\
               1,Ann,500,Flu,2024-01-01,\n\
               2,Bo,5000,Surgery,2024-01-10,2\n\
               3,Cy,750,Whiplash,2024-01-05,1\n";

    let response = service.upload("batch.csv", csv.as_bytes().to_vec()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let ExtractedPayload::Data(claims) = response.extracted_data else {
        panic!("expected claim rows");
    };

    let statuses: Vec<FraudStatus> = claims.iter().map(|c| c.fraud_status).collect();
    assert_eq!(
        statuses,
        vec![FraudStatus::Valid, FraudStatus::Fraudulent, FraudStatus::Valid]
    );

    let days: Vec<i64> = claims.iter().map(|c| c.days_since_service).collect();
    assert_eq!(days, vec![0, 9, 4]);
    assert_eq!(claims[0].claim_frequency, 1);
    assert_eq!(claims[1].claim_frequency, 2);
    assert_eq!(claims[1].high_claim, 1);
    assert_eq!(claims[0].high_claim, 0);
    assert_eq!(claims[2].diagnosis, "Whiplash");
}

#[tokio::test]
async fn missing_column_never_reaches_classifier() {
    let dir = tempfile::tempdir().unwrap();
    let (service, calls) = service(dir.path());

    let err = service
        .upload("batch.csv", b"Claim Amount,Date of Service\n10,2024-01-01\n".to_vec())
        .await
        .unwrap_err();

    match err {
        IntakeError::MissingColumns(cols) => assert_eq!(cols, vec!["Diagnosis".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_date_rejects_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (service, calls) = service(dir.path());

    let csv = "Claim Amount,Diagnosis,Date of Service\n10,Flu,2024-01-01\n20,Flu,someday\n";
    let err = service.upload("batch.csv", csv.as_bytes().to_vec()).await.unwrap_err();

    assert!(matches!(err, IntakeError::InvalidInput(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (service, calls) = service(dir.path());

    let err = service.upload("claims.txt", b"anything".to_vec()).await.unwrap_err();

    assert!(matches!(err, IntakeError::UnsupportedFileType(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn stored_invoices_are_listed_with_counts() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(dir.path());

    let csv = "Claim Amount,Diagnosis,Date of Service\n100,Surgery,2024-01-01\n200,Flu,2024-01-02\n";
    let first = service.upload("a.csv", csv.as_bytes().to_vec()).await.unwrap();
    let second = service.upload("b.csv", csv.as_bytes().to_vec()).await.unwrap();
    assert!(second.invoice_id > first.invoice_id);

    let summaries = service.list().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].filename, "a.csv");
    assert_eq!(summaries[0].claims, 2);
    assert_eq!(summaries[0].fraudulent, 1);

    let fetched = service.get(first.invoice_id).await.unwrap();
    assert_eq!(fetched.filename, "a.csv");
}

#[tokio::test]
async fn failed_row_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with(dir.path(), Box::new(CappedModel));

    let csv = "Claim Amount,Diagnosis,Date of Service\n100,Flu,2024-02-01\n12000,Surgery,2024-02-02\n300,Flu,2024-02-03\n";
    let response = service.upload("batch.csv", csv.as_bytes().to_vec()).await.unwrap();

    let ExtractedPayload::Data(claims) = response.extracted_data else {
        panic!("expected claim rows");
    };
    let statuses: Vec<FraudStatus> = claims.iter().map(|c| c.fraud_status).collect();
    assert_eq!(
        statuses,
        vec![
            FraudStatus::Valid,
            FraudStatus::PredictionFailed,
            FraudStatus::Valid
        ]
    );
    assert_eq!(service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn blank_amount_fails_only_its_row() {
    let dir = tempfile::tempdir().unwrap();
    let (service, calls) = service(dir.path());

    let csv = "Claim Amount,Diagnosis,Date of Service\n500,Flu,2024-01-01\n,Flu,2024-01-02\n700,Surgery,2024-01-03\n";
    let response = service.upload("batch.csv", csv.as_bytes().to_vec()).await.unwrap();

    // The blank row is refused by the scaler before it reaches the model.
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let ExtractedPayload::Data(claims) = &response.extracted_data else {
        panic!("expected claim rows");
    };
    let statuses: Vec<FraudStatus> = claims.iter().map(|c| c.fraud_status).collect();
    assert_eq!(
        statuses,
        vec![
            FraudStatus::Valid,
            FraudStatus::PredictionFailed,
            FraudStatus::Fraudulent
        ]
    );
    assert_eq!(claims[1].claim_amount, None);
    assert_eq!(claims[1].days_since_service, 1);
    assert_eq!(claims[1].high_claim, 0);

    let fetched = service.get(response.invoice_id).await.unwrap();
    assert_eq!(fetched.extracted_data, response.extracted_data);
}
