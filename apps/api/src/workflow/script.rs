use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};

use super::{StageOutcome, WorkflowError, Workflows};
use crate::blob::artifacts::{self, ArtifactClass};
use crate::blob::put_once;
use crate::book::classify::classify;
use crate::book::prompt::render_batch_prompt;
use crate::book::BookMap;
use crate::entity::radio_show::RadioShowStatus;
use crate::llm_client::prompts::{radio_script_prompt, RADIO_SCRIPT_SYSTEM};
use crate::timezone::to_display;

impl Workflows {
    /// Writes the script for a show's broadcast day, synthesizes it and
    /// publishes both artifacts. A show that is already created is left alone.
    pub async fn run_agent_and_tts(&self, radio_show_id: &str) -> Result<StageOutcome, WorkflowError> {
        let mut show = self
            .radio_shows
            .get_and_migrate(radio_show_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("radio_shows/{radio_show_id}")))?;

        if show.is_created() {
            info!("Radio show {radio_show_id} already created, skipping");
            return Ok(StageOutcome::AlreadyDone);
        }

        let masterdata_path = show
            .masterdata_blob_path
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| WorkflowError::MissingMasterdata(radio_show_id.to_string()))?;
        let body = self.blobs.download(&masterdata_path).await?;
        let books: BookMap =
            serde_json::from_slice(&body).map_err(|source| WorkflowError::CorruptMasterdata {
                path: masterdata_path.clone(),
                source,
            })?;

        let now = Utc::now();
        let reference = to_display(&show.broadcasted_at.unwrap_or(now));
        let partition = classify(&books, &reference)?;
        info!(
            "Radio show {radio_show_id}: {} past, {} current, {} future books",
            partition.past.len(),
            partition.current.len(),
            partition.future.len()
        );
        if partition.current.is_empty() {
            warn!("Radio show {radio_show_id} has no books for {}", reference.date_naive());
            return Err(WorkflowError::NothingToBroadcast(reference.date_naive()));
        }

        let date = reference.format("%Y-%m-%d").to_string();
        let prompt = radio_script_prompt(&date, &render_batch_prompt(&partition.current));
        let script = self.llm.complete(&prompt, RADIO_SCRIPT_SYSTEM).await?;
        let audio = self.tts.synthesize(&script).await?;

        let signature = artifacts::stem(&masterdata_path);
        let script_blob = put_once(
            self.blobs.as_ref(),
            &artifacts::script_path(signature)?,
            Bytes::from(script),
            ArtifactClass::Script.put_options(now),
        )
        .await?;
        let audio_blob = put_once(
            self.blobs.as_ref(),
            &artifacts::audio_path(signature)?,
            audio,
            ArtifactClass::Audio.put_options(now),
        )
        .await?;

        show.status = RadioShowStatus::Created;
        show.script_url = Some(script_blob.public_url);
        show.audio_url = Some(audio_blob.public_url);
        show.updated_at = Some(now);
        let outcome = self.radio_shows.update(&show.id, &show).await?;
        info!("Radio show {radio_show_id} published ({outcome:?})");

        Ok(StageOutcome::Completed)
    }
}
