use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::shared::Shared;
use super::signals::Signals;
use super::supervisor::SupervisorRequest;
use crate::models::command::{Command, CommandReply, FileName};
use crate::models::error::PipelineError;
use crate::models::state::ControllerState;
use crate::storage::wav_reader::{open_for_playback, PlaybackStream};

pub type CommandResult = Result<CommandReply, PipelineError>;

/// A command plus an optional slot for its reply.
pub struct CommandEnvelope {
    command: Command,
    reply: Option<Sender<CommandResult>>,
}

/// Handle for submitting commands to the session controller.
///
/// Cheap to clone; every clone feeds the same bounded queue.
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<CommandEnvelope>,
}

impl CommandSender {
    pub(crate) fn new(tx: Sender<CommandEnvelope>) -> Self {
        Self { tx }
    }

    /// Queue `command` without waiting. Fails if the queue is full.
    pub fn submit(&self, command: Command) -> Result<(), PipelineError> {
        self.enqueue(CommandEnvelope { command, reply: None })
    }

    /// Queue `command` and wait up to `timeout` for its reply.
    pub fn execute(&self, command: Command, timeout: Duration) -> CommandResult {
        let (reply_tx, reply_rx) = bounded(1);
        self.enqueue(CommandEnvelope {
            command,
            reply: Some(reply_tx),
        })?;
        match reply_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::Timeout("command reply")),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::PipelineStopped),
        }
    }

    fn enqueue(&self, envelope: CommandEnvelope) -> Result<(), PipelineError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => PipelineError::CommandQueueFull,
            TrySendError::Disconnected(_) => PipelineError::PipelineStopped,
        })
    }
}

/// Session controller: the single consumer of the command channel.
///
/// Commands are handled strictly one at a time. Refusals (busy, already
/// recording, not recording) are ordinary replies; failures are errors and
/// also raise the `Error` state. `Error` still accepts new sessions.
pub struct SessionController {
    shared: Arc<Shared>,
    supervisor: Sender<SupervisorRequest>,
    reader: Sender<PlaybackStream>,
    commands: Receiver<CommandEnvelope>,
}

impl SessionController {
    pub fn new(
        shared: Arc<Shared>,
        supervisor: Sender<SupervisorRequest>,
        reader: Sender<PlaybackStream>,
        commands: Receiver<CommandEnvelope>,
    ) -> Self {
        Self {
            shared,
            supervisor,
            reader,
            commands,
        }
    }

    pub fn run(mut self) {
        while !self.shared.is_shutdown() {
            match self.commands.recv_timeout(self.shared.config.command_poll()) {
                Ok(envelope) => {
                    let result = self.dispatch(envelope.command);
                    if let Some(reply) = envelope.reply {
                        let _ = reply.try_send(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) -> CommandResult {
        log::debug!("command {:?} in state {}", command, self.shared.state());
        let result = match command {
            Command::StartRecord => self.start_record(),
            Command::StopRecord => self.stop_record(),
            Command::ListFiles => self.list_files(),
            Command::PlayFile(name) => self.play_file(name),
            Command::DeleteFile(name) => self.delete_file(name),
        };
        match &result {
            Ok(reply) => log::debug!("reply: {}", reply),
            Err(e) => self.shared.report_error(e.clone()),
        }
        result
    }

    fn start_record(&mut self) -> CommandResult {
        let signals = self.shared.signals.get();
        if signals.contains(Signals::RECORDING) {
            return Ok(CommandReply::AlreadyRecording);
        }
        let state = ControllerState::from_signals(signals);
        if !state.accepts_sessions() {
            return Ok(CommandReply::Busy(state));
        }

        self.shared.update_signals(
            Signals::RECORDING,
            Signals::RECORDING_DONE | Signals::STOP_REQUESTED | Signals::ERROR,
        );
        if self.supervisor.try_send(SupervisorRequest::Start).is_err() {
            self.shared.update_signals(Signals::NONE, Signals::RECORDING);
            return Err(PipelineError::Internal("recording supervisor is not accepting requests".into()));
        }
        Ok(CommandReply::RecordingStarted)
    }

    fn stop_record(&mut self) -> CommandResult {
        if !self.shared.signals.get().contains(Signals::RECORDING) {
            return Ok(CommandReply::NotRecording);
        }

        self.shared.update_signals(Signals::STOP_REQUESTED, Signals::NONE);
        let done = self
            .shared
            .signals
            .wait_any(Signals::RECORDING_DONE, self.shared.config.stop_timeout(), false);
        if done.is_none() {
            return Err(PipelineError::Timeout("recording to stop"));
        }

        let summary = self
            .shared
            .last_recording()
            .ok_or_else(|| PipelineError::Internal("recording finished without a summary".into()))?;
        Ok(CommandReply::RecordingStopped(summary))
    }

    fn list_files(&mut self) -> CommandResult {
        let mut entries = self.shared.fs.list()?;
        entries.retain(|entry| entry.name.to_ascii_lowercase().ends_with(".wav"));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(CommandReply::Files(entries))
    }

    fn delete_file(&mut self, name: FileName) -> CommandResult {
        let state = self.shared.state();
        if state == ControllerState::Playing && self.shared.now_playing().as_deref() == Some(name.as_str()) {
            return Ok(CommandReply::Busy(state));
        }
        if !self.shared.fs.exists(name.as_str()) {
            return Err(PipelineError::FileNotFound(name.to_string()));
        }
        self.shared.fs.remove(name.as_str())?;
        log::info!("deleted {}", name);
        Ok(CommandReply::Deleted(name))
    }

    fn play_file(&mut self, name: FileName) -> CommandResult {
        let state = self.shared.state();
        if !state.accepts_sessions() {
            return Ok(CommandReply::Busy(state));
        }

        let stream = open_for_playback(Arc::clone(&self.shared.fs), name.as_str(), &self.shared.config.format())?;
        let header = *stream.header();

        self.shared.set_now_playing(Some(name.to_string()));
        self.shared
            .update_signals(Signals::PLAYING, Signals::PLAYBACK_DONE | Signals::ERROR);
        if self
            .reader
            .send_timeout(stream, self.shared.config.chunk_send_timeout())
            .is_err()
        {
            self.shared.set_now_playing(None);
            self.shared.update_signals(Signals::NONE, Signals::PLAYING);
            return Err(PipelineError::Timeout("storage reader to accept stream"));
        }
        Ok(CommandReply::PlaybackStarted { name, header })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PipelineConfig;
    use crate::processing::wav_format::ContainerHeader;
    use crate::storage::memory::MemoryFileService;
    use crate::traits::file_service::FileService;
    use crate::traits::observer::NoopObserver;

    struct Harness {
        controller: SessionController,
        shared: Arc<Shared>,
        fs: Arc<MemoryFileService>,
        supervisor: Receiver<SupervisorRequest>,
        reader: Receiver<PlaybackStream>,
    }

    fn harness() -> Harness {
        let fs = Arc::new(MemoryFileService::new());
        let config = PipelineConfig {
            stop_timeout_ms: 50,
            ..Default::default()
        };
        let shared = Arc::new(Shared::new(config, fs.clone(), Arc::new(NoopObserver)));
        let (sup_tx, sup_rx) = bounded(1);
        let (reader_tx, reader_rx) = bounded(1);
        let (_cmd_tx, cmd_rx) = bounded(1);
        Harness {
            controller: SessionController::new(shared.clone(), sup_tx, reader_tx, cmd_rx),
            shared,
            fs,
            supervisor: sup_rx,
            reader: reader_rx,
        }
    }

    fn wav(samples: usize) -> Vec<u8> {
        let header = ContainerHeader::for_samples(&Default::default(), samples).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.resize(bytes.len() + samples * 2, 0);
        bytes
    }

    fn name(s: &str) -> FileName {
        FileName::new(s).unwrap()
    }

    #[test]
    fn second_start_is_a_no_op() {
        let mut h = harness();
        assert_eq!(h.controller.dispatch(Command::StartRecord), Ok(CommandReply::RecordingStarted));
        assert_eq!(h.controller.dispatch(Command::StartRecord), Ok(CommandReply::AlreadyRecording));
        assert_eq!(h.supervisor.len(), 1);
    }

    #[test]
    fn stop_while_idle_is_a_status_not_an_error() {
        let mut h = harness();
        assert_eq!(h.controller.dispatch(Command::StopRecord), Ok(CommandReply::NotRecording));
        assert_eq!(h.shared.state(), ControllerState::Idle);
    }

    #[test]
    fn stop_times_out_without_supervisor() {
        let mut h = harness();
        h.controller.dispatch(Command::StartRecord).unwrap();
        assert_eq!(
            h.controller.dispatch(Command::StopRecord),
            Err(PipelineError::Timeout("recording to stop"))
        );
    }

    #[test]
    fn play_while_recording_is_busy() {
        let mut h = harness();
        h.fs.insert("a.wav", wav(4));
        h.controller.dispatch(Command::StartRecord).unwrap();

        let reply = h.controller.dispatch(Command::PlayFile(name("a.wav")));
        assert_eq!(reply, Ok(CommandReply::Busy(ControllerState::Recording)));
        assert_eq!(h.shared.state(), ControllerState::Recording);
        assert_eq!(h.fs.open_handles(), 0);
    }

    #[test]
    fn play_while_writing_is_busy() {
        let mut h = harness();
        h.fs.insert("a.wav", wav(4));
        h.shared.update_signals(Signals::WRITING, Signals::NONE);

        let reply = h.controller.dispatch(Command::PlayFile(name("a.wav")));
        assert_eq!(reply, Ok(CommandReply::Busy(ControllerState::Writing)));
        assert_eq!(
            h.controller.dispatch(Command::StartRecord),
            Ok(CommandReply::Busy(ControllerState::Writing))
        );
    }

    #[test]
    fn play_hands_stream_to_reader() {
        let mut h = harness();
        h.fs.insert("a.wav", wav(8));

        let reply = h.controller.dispatch(Command::PlayFile(name("a.wav"))).unwrap();
        assert!(matches!(reply, CommandReply::PlaybackStarted { ref header, .. } if header.sample_count() == 8));
        assert_eq!(h.shared.state(), ControllerState::Playing);

        let stream = h.reader.try_recv().unwrap();
        assert_eq!(stream.name(), "a.wav");
    }

    #[test]
    fn corrupted_file_raises_error_and_stays_idle() {
        let mut h = harness();
        let mut bytes = wav(8);
        bytes[8] = b'X';
        h.fs.insert("bad.wav", bytes);

        let result = h.controller.dispatch(Command::PlayFile(name("bad.wav")));
        assert!(matches!(result, Err(PipelineError::InvalidFormat(_))));
        assert_eq!(h.shared.state(), ControllerState::Error);
        assert_eq!(h.fs.open_handles(), 0);
        assert!(h.reader.is_empty());

        // Error still accepts sessions.
        assert_eq!(h.controller.dispatch(Command::StartRecord), Ok(CommandReply::RecordingStarted));
    }

    #[test]
    fn list_shows_only_wav_files_sorted() {
        let mut h = harness();
        h.fs.insert("rec_0001.wav", wav(0));
        h.fs.insert("notes.txt", vec![1]);
        h.fs.insert("rec_0000.wav", wav(2));

        match h.controller.dispatch(Command::ListFiles).unwrap() {
            CommandReply::Files(entries) => {
                let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(names, vec!["rec_0000.wav", "rec_0001.wav"]);
                assert_eq!(entries[0].size, 48);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn delete_checks_existence_and_current_playback() {
        let mut h = harness();
        assert_eq!(
            h.controller.dispatch(Command::DeleteFile(name("gone.wav"))),
            Err(PipelineError::FileNotFound("gone.wav".into()))
        );

        h.fs.insert("a.wav", wav(8));
        h.controller.dispatch(Command::PlayFile(name("a.wav"))).unwrap();
        assert_eq!(
            h.controller.dispatch(Command::DeleteFile(name("a.wav"))),
            Ok(CommandReply::Busy(ControllerState::Playing))
        );

        h.fs.insert("b.wav", wav(8));
        assert_eq!(
            h.controller.dispatch(Command::DeleteFile(name("b.wav"))),
            Ok(CommandReply::Deleted(name("b.wav")))
        );
        assert!(!h.fs.exists("b.wav"));
    }

    #[test]
    fn full_queue_is_reported() {
        let (tx, _rx) = bounded(1);
        let sender = CommandSender::new(tx);
        sender.submit(Command::ListFiles).unwrap();
        assert_eq!(sender.submit(Command::ListFiles), Err(PipelineError::CommandQueueFull));
    }

    #[test]
    fn closed_queue_means_stopped() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let sender = CommandSender::new(tx);
        assert_eq!(
            sender.execute(Command::StopRecord, Duration::from_millis(10)),
            Err(PipelineError::PipelineStopped)
        );
    }
}
