//! The register manager: load declared registers, group them, read the
//! groups on a schedule the caller drives, decode and deliver through a
//! bounded queue to a consumer task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::{stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::Client;
use crate::config::ManagerConfig;
use crate::constants::function;
use crate::errors::{ClientError, ValidationError};

use super::decode::{decode_bits, decode_words};
use super::grouping::{group_registers, RegisterGroup};
use super::types::DeviceRegister;

pub type ReadCallback = Box<dyn Fn(&[DeviceRegister]) + Send + Sync + 'static>;
pub type ErrorCallback = Box<dyn Fn(&GroupReadError) + Send + Sync + 'static>;

/// A failed group read, identifying the window that produced it.
#[derive(Debug)]
pub struct GroupReadError {
    pub slave_id: u8,
    pub function: u8,
    pub start_address: u16,
    pub quantity: u16,
    pub error: ClientError,
}

impl GroupReadError {
    fn new(group: &RegisterGroup, error: ClientError) -> Self {
        Self {
            slave_id: group.slave_id,
            function: group.function,
            start_address: group.start_address,
            quantity: group.quantity,
            error,
        }
    }
}

impl std::fmt::Display for GroupReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slave {} function {:#04X} @{}+{}: {}",
            self.slave_id, self.function, self.start_address, self.quantity, self.error
        )
    }
}

#[derive(Default)]
struct Callbacks {
    on_read: Option<ReadCallback>,
    on_error: Option<ErrorCallback>,
}

/// Streams decoded register batches from grouped Modbus reads.
///
/// Callbacks run on the consumer task while the callback registry lock
/// is held: a callback that calls back into this manager deadlocks.
pub struct RegisterManager {
    client: Arc<Client>,
    config: ManagerConfig,
    groups: Mutex<Arc<Vec<RegisterGroup>>>,
    callbacks: Arc<Mutex<Callbacks>>,
    data_tx: mpsc::Sender<Vec<DeviceRegister>>,
    data_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Vec<DeviceRegister>>>>,
    consumer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown: broadcast::Sender<()>,
    closed: AtomicBool,
}

impl RegisterManager {
    pub fn new(client: Arc<Client>, config: ManagerConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let (data_tx, data_rx) = mpsc::channel(config.queue_size);

        Ok(Self {
            client,
            config,
            groups: Mutex::new(Arc::new(Vec::new())),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            data_tx,
            data_rx: tokio::sync::Mutex::new(Some(data_rx)),
            consumer: tokio::sync::Mutex::new(None),
            shutdown: broadcast::channel(1).0,
            closed: AtomicBool::new(false),
        })
    }

    /// Installs the callback invoked with each decoded batch.
    pub fn on_read<F>(&self, callback: F)
    where
        F: Fn(&[DeviceRegister]) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.on_read = Some(Box::new(callback));
        }
    }

    /// Installs the callback invoked with each failed group read.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&GroupReadError) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.on_error = Some(Box::new(callback));
        }
    }

    /// Validates, groups and freezes the register set. Replaces any
    /// previously loaded set.
    pub fn load(&self, registers: &[DeviceRegister]) -> Result<usize, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let groups = group_registers(registers, self.config.dedup_addresses)?;
        let count = groups.len();
        if let Ok(mut guard) = self.groups.lock() {
            *guard = Arc::new(groups);
        }

        info!("Loaded {} registers into {} groups", registers.len(), count);
        Ok(count)
    }

    /// Spawns the consumer task feeding callbacks from the data queue.
    /// A second call while running is a no-op.
    pub async fn start(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let mut rx_guard = self.data_rx.lock().await;
        let Some(mut data_rx) = rx_guard.take() else {
            return Ok(());
        };

        let callbacks = Arc::clone(&self.callbacks);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    batch = data_rx.recv() => match batch {
                        Some(batch) => {
                            if let Ok(callbacks) = callbacks.lock() {
                                if let Some(on_read) = &callbacks.on_read {
                                    on_read(&batch);
                                }
                            }
                        }
                        None => break,
                    },
                    _ = shutdown_rx.recv() => {
                        debug!("Consumer task received shutdown signal");
                        break;
                    }
                }
            }
        });

        *self.consumer.lock().await = Some(handle);
        debug!("Started consumer task");
        Ok(())
    }

    /// Reads every loaded group once, pushing decoded batches to the
    /// queue. Groups run concurrently on TCP transports, sequentially on
    /// serial. Returns the failures; a failed group never aborts the
    /// cycle.
    pub async fn read_and_stream(&self) -> Result<Vec<GroupReadError>, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let groups = match self.groups.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(_) => return Err(ClientError::Closed),
        };
        if groups.is_empty() {
            return Err(ValidationError::Empty.into());
        }

        let mut failures = Vec::new();

        if self.client.transport().supports_concurrent_dispatch() {
            let results: Vec<Option<GroupReadError>> = stream::iter(groups.iter())
                .map(|group| self.process_group(group))
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;
            failures.extend(results.into_iter().flatten());
        } else {
            for group in groups.iter() {
                if let Some(failure) = self.process_group(group).await {
                    failures.push(failure);
                }
            }
        }

        Ok(failures)
    }

    /// Signals the consumer to exit and joins it. Safe to call twice.
    pub async fn stop(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown.send(());
        if let Some(handle) = self.consumer.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Consumer task panicked: {}", e);
            }
        }

        info!("Register manager stopped");
        Ok(())
    }

    async fn process_group(&self, group: &RegisterGroup) -> Option<GroupReadError> {
        match self.read_group(group).await {
            Ok(batch) => {
                if self.data_tx.send(batch).await.is_err() {
                    return Some(GroupReadError::new(group, ClientError::Closed));
                }
                None
            }
            Err(error) => {
                debug!("Group read failed: {}: {}", group, error);
                let failure = GroupReadError::new(group, error);
                if let Ok(callbacks) = self.callbacks.lock() {
                    if let Some(on_error) = &callbacks.on_error {
                        on_error(&failure);
                    }
                }
                Some(failure)
            }
        }
    }

    /// One physical read spanning the group, sliced back to each member.
    async fn read_group(&self, group: &RegisterGroup) -> Result<Vec<DeviceRegister>, ClientError> {
        let mut batch = Vec::with_capacity(group.registers.len());

        match group.function {
            function::READ_COILS | function::READ_DISCRETE_INPUTS => {
                let bits = if group.function == function::READ_COILS {
                    self.client
                        .read_coils(group.slave_id, group.start_address, group.quantity)
                        .await?
                } else {
                    self.client
                        .read_discrete_inputs(group.slave_id, group.start_address, group.quantity)
                        .await?
                };

                for register in &group.registers {
                    let offset = (register.read_address - group.start_address) as usize;
                    let window = &bits[offset..offset + register.read_quantity as usize];

                    let mut updated = register.clone();
                    updated.value = window.iter().map(|&bit| u16::from(bit)).collect();
                    updated.decoded_value = Some(decode_bits(window, &register.data_type)?);
                    batch.push(updated);
                }
            }
            _ => {
                let words = if group.function == function::READ_HOLDING_REGISTERS {
                    self.client
                        .read_holding_registers(group.slave_id, group.start_address, group.quantity)
                        .await?
                } else {
                    self.client
                        .read_input_registers(group.slave_id, group.start_address, group.quantity)
                        .await?
                };

                for register in &group.registers {
                    let offset = (register.read_address - group.start_address) as usize;
                    let window = &words[offset..offset + register.read_quantity as usize];

                    let mut updated = register.clone();
                    updated.value = window.to_vec();
                    updated.decoded_value = Some(decode_words(
                        window,
                        &register.data_type,
                        register.data_order,
                    )?);
                    batch.push(updated);
                }
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::new_tcp_client;
    use crate::config::TcpConfig;
    use crate::register::types::{DataOrder, DataType, ScalarType};

    fn lazy_manager() -> RegisterManager {
        // TCP connects lazily, so no server is needed for lifecycle tests.
        let client = new_tcp_client("127.0.0.1:1502", &TcpConfig::default()).unwrap();
        RegisterManager::new(Arc::new(client), ManagerConfig::default()).unwrap()
    }

    fn register(tag: &str, address: u16) -> DeviceRegister {
        DeviceRegister::new(
            tag,
            1,
            function::READ_HOLDING_REGISTERS,
            address,
            1,
            DataType::Scalar(ScalarType::Uint16),
            DataOrder::Ab,
        )
    }

    #[tokio::test]
    async fn test_load_rejects_duplicates() {
        let manager = lazy_manager();
        let result = manager.load(&[register("t", 0), register("t", 1)]);
        assert!(matches!(
            result,
            Err(ClientError::Validation(ValidationError::DuplicateTag(_)))
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let manager = lazy_manager();
        manager.start().await.unwrap();
        manager.stop().await.unwrap();
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_stop_are_closed() {
        let manager = lazy_manager();
        manager.stop().await.unwrap();
        assert!(matches!(manager.start().await, Err(ClientError::Closed)));
        assert!(matches!(
            manager.load(&[register("t", 0)]),
            Err(ClientError::Closed)
        ));
        assert!(matches!(
            manager.read_and_stream().await,
            Err(ClientError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_read_without_load_is_empty() {
        let manager = lazy_manager();
        assert!(matches!(
            manager.read_and_stream().await,
            Err(ClientError::Validation(ValidationError::Empty))
        ));
    }
}
