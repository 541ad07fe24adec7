use crate::{
    codec::{Codec, ReplyTargets},
    telemetry::{increment_call_errors, increment_calls},
    transport::EnvelopeStream,
};
use gamelink_core::{Error, Result, proto::GameMsg};
use serde::Serialize;

/// A bidirectional stream to one node, used as a sequence of request/reply
/// pairs.
///
/// Each [`call`](Self::call) sends one envelope and waits for exactly one
/// reply, so a single `GameStream` must not be shared between concurrent
/// callers. Streams carry no deadline; wrap calls in [`tokio::time::timeout`]
/// if a bounded wait is needed.
pub struct GameStream<S, C> {
    inner: S,
    codec: C,
}

impl<S: EnvelopeStream, C: Codec> GameStream<S, C> {
    pub(crate) const fn new(inner: S, codec: C) -> Self {
        Self { inner, codec }
    }

    /// Send `request` to `service` and decode the reply into every target of
    /// `R`, in order.
    ///
    /// `R` is a tuple of reply targets, e.g. `(u32,)` or `(Profile, Vec<Item>)`.
    /// Returns `Ok(None)` when the reply has no payload.
    ///
    /// # Errors
    ///
    /// - [`Error::Encode`] if `request` cannot be serialized.
    /// - [`Error::Transport`] if the stream fails or the peer closes it.
    /// - [`Error::Remote`] if the callee reported a failure.
    /// - [`Error::Decode`] if any reply target fails to decode.
    pub async fn call<Q, R>(&mut self, service: &str, request: &Q) -> Result<Option<R>>
    where
        Q: Serialize + ?Sized,
        R: ReplyTargets,
    {
        increment_calls();
        let result = self.exchange(service, request).await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                increment_call_errors(e.kind());
                return Err(e);
            }
        };
        if !reply.has_payload() {
            return Ok(None);
        }

        match self.codec.decode_all(&reply.msg) {
            Ok(targets) => Ok(Some(targets)),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to decode stream reply from {service}: {e}");
                increment_call_errors(e.kind());
                Err(e)
            }
        }
    }

    /// Send `request` to `service` and wait for its reply without decoding it.
    ///
    /// # Errors
    ///
    /// Same as [`GameStream::call`], minus decoding.
    pub async fn invoke<Q>(&mut self, service: &str, request: &Q) -> Result<()>
    where
        Q: Serialize + ?Sized,
    {
        increment_calls();
        self.exchange(service, request)
            .await
            .map(drop)
            .inspect_err(|e| increment_call_errors(e.kind()))
    }

    /// Send one envelope without waiting for a reply.
    ///
    /// The peer's answer, if it sends one, is left on the stream; the next
    /// [`call`](Self::call) would receive it instead of its own reply.
    ///
    /// # Errors
    ///
    /// [`Error::Encode`] or [`Error::Transport`].
    pub async fn send<Q>(&mut self, service: &str, request: &Q) -> Result<()>
    where
        Q: Serialize + ?Sized,
    {
        let payload = self.codec.encode(request)?;
        self.inner
            .send(GameMsg::request(service, payload))
            .await
            .map_err(Error::Transport)
    }

    /// Half-close the stream. The peer observes end of stream and later sends
    /// fail.
    pub fn close_send(&mut self) {
        self.inner.close_send();
    }

    async fn exchange<Q>(&mut self, service: &str, request: &Q) -> Result<GameMsg>
    where
        Q: Serialize + ?Sized,
    {
        self.send(service, request).await?;
        let reply = self.inner.recv().await?;

        if let Some(message) = reply.remote_error() {
            return Err(Error::Remote {
                message: message.to_string(),
            });
        }
        Ok(reply)
    }
}
