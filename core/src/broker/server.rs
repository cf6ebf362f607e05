use crate::protocol::kafka::KafkaFrameCodec;
use crate::{broker::MessageHandler, config::BrokerConfig, KestrelError, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

pub struct BrokerServer {
    config: BrokerConfig,
    handler: Arc<MessageHandler>,
    // Holds the stop flag, so a shutdown before `serve` is not lost
    shutdown_tx: watch::Sender<bool>,
}

impl BrokerServer {
    /// Validates `config` and builds the metadata index from its metadata log.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        config.validate().map_err(KestrelError::Config)?;
        let handler = Arc::new(MessageHandler::from_config(&config)?);
        Ok(Self::with_handler(config, handler))
    }

    pub fn with_handler(config: BrokerConfig, handler: Arc<MessageHandler>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            handler,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn handler(&self) -> Arc<MessageHandler> {
        Arc::clone(&self.handler)
    }

    /// Stops accepting new connections. Connections already open finish on their own.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown_tx.send_replace(true);
    }

    /// Binds the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_address();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| KestrelError::Network(format!("failed to bind {}: {}", addr, e)))
    }

    /// [`bind`](Self::bind) followed by [`serve`](Self::serve).
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until [`shutdown`](Self::shutdown)
    /// is called. Each connection gets its own task.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Kestrel broker listening on {}", local_addr);

        let metrics = self.handler.get_metrics();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }

            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            if metrics.active_connections() >= self.config.max_connections {
                                warn!(
                                    "Connection limit {} reached, dropping connection from {}",
                                    self.config.max_connections, peer_addr
                                );
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                            }

                            // handle_client decrements on exit
                            metrics.connection_opened();

                            let handler = Arc::clone(&self.handler);
                            let max_frame_size = self.config.max_frame_size;
                            tokio::spawn(async move {
                                if let Err(e) =
                                    Self::handle_client(stream, peer_addr, handler, max_frame_size).await
                                {
                                    error!("Connection {} failed: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {}
            }
        }

        info!("Accept loop stopped");
        Ok(())
    }

    /// Reads one request, writes its response, repeats. Any framing or
    /// decode failure closes this connection only. The caller has already
    /// counted the connection as open.
    async fn handle_client(
        stream: TcpStream,
        peer_addr: SocketAddr,
        handler: Arc<MessageHandler>,
        max_frame_size: usize,
    ) -> Result<()> {
        let metrics = handler.get_metrics();
        info!(
            "New client connected: {} (active: {})",
            peer_addr,
            metrics.active_connections()
        );

        let mut framed = Framed::new(stream, KafkaFrameCodec::new(max_frame_size));
        let mut result = Ok(());

        while let Some(frame) = framed.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to read frame from {}: {}", peer_addr, e);
                    metrics.error_occurred();
                    break;
                }
            };

            match handler.handle_frame(frame).await {
                Ok(response) => {
                    debug!("Sending {} byte response to {}", response.len(), peer_addr);
                    if let Err(e) = framed.send(response).await {
                        result = Err(KestrelError::Network(format!(
                            "failed to send response: {}",
                            e
                        )));
                        break;
                    }
                }
                Err(e) => {
                    warn!("Closing connection {}: {}", peer_addr, e);
                    break;
                }
            }
        }

        metrics.connection_closed();
        info!("Connection {} closed", peer_addr);
        result
    }
}
