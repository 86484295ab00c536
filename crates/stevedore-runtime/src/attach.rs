//! Attaching to a container's monitor.

use stevedore_attach::{AttachRequest, AttachStreams};
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::keys::parse_detach_keys;
use stevedore_common::types::TerminalSize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::supervisor::Supervisor;

/// Caller choices for an attach session.
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    /// Do not forward stdin and leave the terminal mode alone.
    pub suppress_stdin: bool,
    /// Detach sequence overriding the configured one.
    pub detach_keys: Option<String>,
}

impl Supervisor {
    /// Checks that a container can be attached to and describes how.
    ///
    /// # Errors
    ///
    /// Returns a resolution error, `NotAttachable` unless the container is
    /// created or running, `NoTty` if it has no terminal, or a `Config`
    /// error for unparsable detach keys.
    pub fn prepare_attach(&self, id_or_name: &str, options: &AttachOptions) -> Result<AttachRequest> {
        let ctr = self.lookup(id_or_name)?;
        let state = self.runtime.update_status(&ctr)?;
        if !state.is_attachable() {
            return Err(StevedoreError::NotAttachable {
                id: ctr.id().to_string(),
                state,
            });
        }
        if !ctr.terminal() {
            return Err(StevedoreError::NoTty {
                id: ctr.id().to_string(),
            });
        }

        let keys = options
            .detach_keys
            .as_deref()
            .unwrap_or(&self.config.detach_keys);
        Ok(AttachRequest {
            socket_path: self.config.attach_socket_path(ctr.id().as_str()),
            control_path: ctr.control_path(),
            detach_keys: parse_detach_keys(keys)?,
            suppress_stdin: options.suppress_stdin,
        })
    }

    /// Attaches the caller's streams to a prepared container session until
    /// the monitor closes it or the user detaches.
    ///
    /// The request comes from [`prepare_attach`](Self::prepare_attach),
    /// which queries the runtime synchronously and belongs outside the
    /// async context.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::DetachedByUser`] on detach, or the
    /// session's I/O error.
    pub async fn attach<I, O, E>(
        &self,
        request: &AttachRequest,
        streams: AttachStreams<'_, I, O, E>,
        resizes: mpsc::Receiver<TerminalSize>,
    ) -> Result<()>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        tracing::info!(
            socket = %request.socket_path.display(),
            detach_keys = request.detach_keys.len(),
            "attaching"
        );
        stevedore_attach::attach(request, streams, resizes).await
    }
}
