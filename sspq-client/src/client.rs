//! Connection to an SSPQ broker

use crate::config::ClientConfig;
use crate::error::{Result, SspqClientError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use sspq::{Message, MessageType, SspqCodec};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info};

/// A message handed to this consumer by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Bytes,
    /// Retries left if this delivery is not confirmed
    pub retries: u8,
}

/// One connection to the broker, usable as producer, consumer or both.
pub struct SspqClient {
    address: String,
    framed: Framed<TcpStream, SspqCodec>,
    receive_timeout: Option<Duration>,
}

impl SspqClient {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        debug!("Connecting to broker: {}", config.address);

        let stream = timeout(config.connect_timeout, TcpStream::connect(&config.address))
            .await
            .map_err(|_| SspqClientError::timeout(config.connect_timeout.as_millis() as u64))?
            .map_err(|e| {
                SspqClientError::connection(format!(
                    "Failed to connect to {}: {}",
                    config.address, e
                ))
            })?;
        stream.set_nodelay(true)?;

        info!("Connected to broker: {}", config.address);
        Ok(Self {
            address: config.address,
            framed: Framed::new(
                stream,
                SspqCodec::with_max_frame_size(config.max_frame_size),
            ),
            receive_timeout: config.receive_timeout,
        })
    }

    pub async fn connect_to(address: impl Into<String>) -> Result<Self> {
        Self::connect(ClientConfig::new(address)).await
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Submit a message. The broker does not acknowledge submissions.
    pub async fn send(&mut self, payload: impl Into<Bytes>, retries: u8) -> Result<()> {
        self.framed.send(Message::send(payload, retries)).await?;
        Ok(())
    }

    /// Ask for the next message and wait for it.
    ///
    /// The delivery must be confirmed with [`SspqClient::confirm`] before
    /// asking again; the broker ignores requests made while a delivery is
    /// outstanding. If the receive timeout elapses the request stays queued
    /// at the broker and a later call picks up the delivery.
    pub async fn receive(&mut self) -> Result<Delivery> {
        self.framed.send(Message::receive()).await?;

        let next = match self.receive_timeout {
            Some(limit) => timeout(limit, self.framed.next())
                .await
                .map_err(|_| SspqClientError::timeout(limit.as_millis() as u64))?,
            None => self.framed.next().await,
        };

        let message = next.ok_or(SspqClientError::Closed)??;
        match message.message_type {
            MessageType::Send => Ok(Delivery {
                payload: message.payload,
                retries: message.retries,
            }),
            other => Err(SspqClientError::protocol(format!(
                "expected a delivery, got {}",
                other
            ))),
        }
    }

    /// Confirm the outstanding delivery.
    pub async fn confirm(&mut self) -> Result<()> {
        self.framed.send(Message::confirm()).await?;
        Ok(())
    }

    /// Close the connection. An unconfirmed delivery is retried by the broker.
    pub async fn close(self) -> Result<()> {
        let mut stream = self.framed.into_inner();
        stream.shutdown().await?;
        Ok(())
    }
}
