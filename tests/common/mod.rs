#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub type PduHandler = Arc<dyn Fn(u8, &[u8]) -> Vec<u8> + Send + Sync>;

/// In-process Modbus TCP server: unframes MBAP requests, asks the
/// handler for a response PDU and frames it back under the request's
/// transaction and unit ids.
pub async fn spawn_server(handler: PduHandler) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { serve(socket, handler).await });
        }
    });

    addr
}

async fn serve(mut socket: TcpStream, handler: PduHandler) {
    loop {
        let mut header = [0u8; 6];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut body = vec![0u8; length];
        if socket.read_exact(&mut body).await.is_err() {
            return;
        }

        let unit_id = body[0];
        let response_pdu = handler(unit_id, &body[1..]);

        let mut frame = Vec::with_capacity(7 + response_pdu.len());
        frame.extend_from_slice(&header[0..2]);
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.extend_from_slice(&response_pdu);

        if socket.write_all(&frame).await.is_err() {
            return;
        }
    }
}

/// Handler serving `words` as one block of holding registers at address 0.
pub fn holding_registers(words: Vec<u16>) -> PduHandler {
    Arc::new(move |_unit, pdu| {
        if pdu[0] != 0x03 {
            return vec![pdu[0] | 0x80, 0x01];
        }
        let address = u16::from_be_bytes([pdu[1], pdu[2]]) as usize;
        let quantity = u16::from_be_bytes([pdu[3], pdu[4]]) as usize;
        if address + quantity > words.len() {
            return vec![pdu[0] | 0x80, 0x02];
        }

        let mut response = vec![0x03, (quantity * 2) as u8];
        for word in &words[address..address + quantity] {
            response.extend_from_slice(&word.to_be_bytes());
        }
        response
    })
}
