mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use modbus_master::{
    new_tcp_client, DataOrder, DataType, DeviceRegister, ManagerConfig, RegisterManager,
    ScalarType, TcpConfig, Value,
};

fn config() -> TcpConfig {
    TcpConfig {
        timeout: Duration::from_secs(2),
        retry_delay: Duration::from_millis(20),
        max_retries: Some(2),
        ..Default::default()
    }
}

fn holding(tag: &str, address: u16, quantity: u16, data_type: DataType) -> DeviceRegister {
    DeviceRegister::new(tag, 1, 0x03, address, quantity, data_type, DataOrder::Ab)
}

#[tokio::test]
async fn test_grouped_read_decodes_and_delivers() {
    let addr = common::spawn_server(common::holding_registers(vec![0xABCD; 8])).await;
    let client = Arc::new(new_tcp_client(&addr.to_string(), &config()).unwrap());
    let manager = RegisterManager::new(client, ManagerConfig::default()).unwrap();

    let mut array = holding("array", 0, 5, DataType::Array(ScalarType::Uint16, 5));
    array.data_order = DataOrder::Abcd;
    let registers = [
        holding("tag1", 0, 1, DataType::Scalar(ScalarType::Uint16)),
        holding("tag2", 1, 1, DataType::Scalar(ScalarType::Uint16)),
        array,
    ];

    // overlapping windows collapse into one read of quantity 5
    assert_eq!(manager.load(&registers).unwrap(), 1);

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
    manager.on_read(move |batch| {
        let _ = batch_tx.send(batch.to_vec());
    });
    manager.start().await.unwrap();

    let failures = manager.read_and_stream().await.unwrap();
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");

    let batch = timeout(Duration::from_secs(2), batch_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 3);

    let by_tag = |tag: &str| {
        batch
            .iter()
            .find(|register| register.tag == tag)
            .unwrap_or_else(|| panic!("missing tag {tag}"))
    };
    assert_eq!(by_tag("tag1").decoded_value, Some(Value::Uint16(0xABCD)));
    assert_eq!(by_tag("tag1").value, vec![0xABCD]);
    assert_eq!(by_tag("tag2").decoded_value, Some(Value::Uint16(0xABCD)));
    assert_eq!(
        by_tag("array").decoded_value,
        Some(Value::Array(vec![Value::Uint16(0xABCD); 5]))
    );

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_failures_are_collected_per_group() {
    // Only 4 registers exist; the second group's window is out of range.
    let addr = common::spawn_server(common::holding_registers(vec![0x0001; 4])).await;
    let client = Arc::new(new_tcp_client(&addr.to_string(), &config()).unwrap());
    let manager = RegisterManager::new(client, ManagerConfig::default()).unwrap();

    let registers = [
        holding("good", 0, 2, DataType::Scalar(ScalarType::Uint32)),
        holding("bad", 200, 1, DataType::Scalar(ScalarType::Uint16)),
    ];
    assert_eq!(manager.load(&registers).unwrap(), 2);

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    manager.on_error(move |failure| {
        let _ = error_tx.send(failure.to_string());
    });

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
    manager.on_read(move |batch| {
        let _ = batch_tx.send(batch.to_vec());
    });
    manager.start().await.unwrap();

    let failures = manager.read_and_stream().await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].start_address, 200);

    // the healthy group still streamed
    let batch = timeout(Duration::from_secs(2), batch_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch[0].tag, "good");
    assert_eq!(batch[0].decoded_value, Some(Value::Uint32(0x0001_0001)));

    let reported = timeout(Duration::from_secs(2), error_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(reported.contains("@200"));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_repeated_cycles_and_stop() {
    let addr = common::spawn_server(common::holding_registers(vec![0x0042; 4])).await;
    let client = Arc::new(new_tcp_client(&addr.to_string(), &config()).unwrap());
    let manager = RegisterManager::new(client, ManagerConfig::default()).unwrap();

    manager
        .load(&[holding("r0", 0, 1, DataType::Scalar(ScalarType::Uint16))])
        .unwrap();

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
    manager.on_read(move |batch| {
        let _ = batch_tx.send(batch.len());
    });
    manager.start().await.unwrap();

    for _ in 0..3 {
        assert!(manager.read_and_stream().await.unwrap().is_empty());
    }
    for _ in 0..3 {
        let delivered = timeout(Duration::from_secs(2), batch_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered, 1);
    }

    manager.stop().await.unwrap();
    manager.stop().await.unwrap();
    assert!(manager.read_and_stream().await.is_err());
}
