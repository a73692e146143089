use std::sync::Arc;
use tracing::{debug, info, warn};

use super::guard::BusyFlag;
use crate::api::{PartnerReply, PracticeApi, RespondRequest};
use crate::error::{PracticeError, Result};
use crate::playback::{AudioResourceCache, PlaybackHandle};
use crate::recording::RecordingUnit;
use crate::session::{MessageId, ProficiencyLevel, Role, SharedLog};

/// Session state an exchange is run against
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    pub scenario: String,
    pub level: ProficiencyLevel,
}

/// Result of one completed turn
#[derive(Debug, Clone)]
pub struct Exchange {
    pub transcript: String,
    pub user_message: MessageId,
    pub partner_message: MessageId,
    pub reply: PartnerReply,
}

/// Runs one conversational turn: transcribe, reply, synthesize.
///
/// At most one turn is in flight at a time; a second call while busy is
/// rejected rather than queued. Placeholders go into the log before each
/// network call and are committed or removed before `run` returns. Results
/// that arrive after the log was cleared are dropped.
pub struct RequestPipeline {
    api: Arc<dyn PracticeApi>,
    log: SharedLog,
    cache: Arc<AudioResourceCache>,
    busy: BusyFlag,
}

impl RequestPipeline {
    pub fn new(api: Arc<dyn PracticeApi>, log: SharedLog, cache: Arc<AudioResourceCache>) -> Self {
        Self {
            api,
            log,
            cache,
            busy: BusyFlag::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn cache(&self) -> &Arc<AudioResourceCache> {
        &self.cache
    }

    pub async fn run(
        &self,
        unit: RecordingUnit,
        context: ExchangeContext,
        playback: &PlaybackHandle,
    ) -> Result<Exchange> {
        let _busy = self
            .busy
            .try_acquire()
            .ok_or(PracticeError::ConcurrentPipelineRejected)?;

        let user = self.log.begin(Role::User);
        let generation = user.generation();
        debug!(bytes = unit.size_bytes, "Transcribing recording");

        let transcript = self.api.transcribe(&unit).await?;
        if !self.log.is_current(generation) {
            return Err(PracticeError::SessionInvalidated);
        }
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(PracticeError::EmptyTranscription);
        }

        // The backend appends `text` to the history itself
        let history = self.log.history();
        let user_message = user.commit(transcript.clone(), None)?;
        info!("User said: {}", transcript);

        let partner = self.log.begin(Role::Partner);
        let request = RespondRequest {
            text: transcript.clone(),
            history,
            scenario: context.scenario,
            level: context.level,
        };
        let reply = self.api.respond(&request).await?;
        if !self.log.is_current(generation) {
            return Err(PracticeError::SessionInvalidated);
        }
        if reply.response.trim().is_empty() {
            return Err(PracticeError::EmptyReply);
        }
        let partner_message = partner.commit(reply.response.clone(), reply.audio_url.clone())?;
        info!("Partner replied ({} chars)", reply.response.len());

        if let Some(url) = &reply.audio_url {
            playback.assign(url);
            let preloaded = self.cache.get(url).await;
            if !self.log.is_current(generation) {
                debug!("Dropping partner audio for a cleared conversation");
                return Err(PracticeError::SessionInvalidated);
            }
            match preloaded {
                Ok(clip) => playback.attach(clip),
                Err(e) => warn!("Failed to preload partner audio {}: {:#}", url, e),
            }
        }

        Ok(Exchange {
            transcript,
            user_message,
            partner_message,
            reply,
        })
    }
}
