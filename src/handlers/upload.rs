//! Upload endpoint: the whole analysis pipeline lives here.
//!
//! Receive file, persist it, get the AI description, optionally run the
//! manual model for a second opinion, return the concatenated report.

use crate::error::AppError;
use crate::services::classifier::{self, ClassifierError, Treatment};
use crate::services::providers::ImagePayload;
use crate::startup::AppState;
use anyhow::anyhow;
use axum::extract::{Multipart, State};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Fixed diagnostic prompt sent with every image.
const ANALYSIS_PROMPT: &str = "dont give any other respone then below mentioned: \n\
    Number of Teeth : \n\
    Name of the Teeth : \n\
    Density of the cavities in the Teeth : \n\
    Identify the tooth number according to FDI system. Check if the tooth has caries. \n\
    If present, check the depth of caries. \n\
    If caries involves the pulp, suggest root canal treatment \n\
    Identify the tooth, check if carious lesion is present, \
    if present see if pulpal involvement is there, if yes suggest root canal treatment :\n\
    What is the better Treatment for this : \n\
    healthy or unhealthy: ";

/// Result of the manual-model step for an unhealthy diagnosis.
enum ManualOutcome {
    /// Dataset folders missing or unusable.
    Skipped,
    Classified {
        accuracy_pct: u32,
        treatment: Treatment,
    },
}

pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(anyhow!("failed to read file: {}", e)))?;
            upload = Some((file_name, data.to_vec()));
            break;
        }
    }

    let (file_name, data) = upload.ok_or_else(|| AppError::BadRequest(anyhow!("No file uploaded")))?;
    if file_name.is_empty() {
        return Err(AppError::BadRequest(anyhow!("No selected file")));
    }

    let stored_path = store_upload(&state.config.uploads.dir, &file_name, &data).await?;
    tracing::info!(path = %stored_path.display(), bytes = data.len(), "stored upload");

    let image = ImagePayload::jpeg(data.clone());
    let ai_output = state.provider.describe(ANALYSIS_PROMPT, &image).await?;

    let manual = if needs_second_opinion(&ai_output) {
        let settings = state.config.classifier.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<ManualOutcome, ClassifierError> {
            match classifier::train(&settings)? {
                Some(model) => {
                    let treatment = model.classify_bytes(&data)?;
                    Ok(ManualOutcome::Classified {
                        accuracy_pct: model.accuracy_pct,
                        treatment,
                    })
                }
                None => Ok(ManualOutcome::Skipped),
            }
        })
        .await
        .map_err(|e| AppError::InternalError(anyhow!("classifier task failed: {}", e)))??;

        Some(outcome)
    } else {
        None
    };

    Ok(finalize_report(&ai_output, manual))
}

/// Persist the upload under a uuid-prefixed name.
///
/// Only the final path component of the client-supplied filename is used.
async fn store_upload(dir: &Path, client_name: &str, data: &[u8]) -> Result<PathBuf, AppError> {
    let safe_name = Path::new(client_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    let stored = dir.join(format!("{}_{}", Uuid::new_v4(), safe_name));
    tokio::fs::write(&stored, data).await?;
    Ok(stored)
}

/// The prompt ends with "healthy or unhealthy:", so the reply carries one of
/// the two words verbatim.
fn needs_second_opinion(ai_output: &str) -> bool {
    ai_output.to_lowercase().contains("unhealthy")
}

fn finalize_report(ai_output: &str, manual: Option<ManualOutcome>) -> String {
    match manual {
        None => format!("{}\n\nEverything looks good — happy smile 😁", ai_output),
        Some(ManualOutcome::Skipped) => format!(
            "{}\n\n⚠️ Manual model dataset not found. Skipping manual prediction.",
            ai_output
        ),
        Some(ManualOutcome::Classified {
            accuracy_pct,
            treatment,
        }) => format!(
            "{}\n\n🔬 Manual Model Accuracy: {}%\nManual Prediction: {}",
            ai_output, accuracy_pct, treatment
        ),
    }
}
