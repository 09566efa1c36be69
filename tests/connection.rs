use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};

use rustash::connection::Connection;
use rustash::frame::Frame;

/// Sets up a local TCP pair where everything sent through the channel is
/// written to the peer socket, so tests control exactly which bytes arrive
/// and when. Dropping the sender closes the peer side.
async fn create_tcp_connection() -> Result<(UnboundedSender<Vec<u8>>, TcpStream), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let local_addr = listener.local_addr()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            while let Some(data) = rx.recv().await {
                if socket.write_all(&data).await.is_err() {
                    break;
                }
            }
        }
    });

    let stream = TcpStream::connect(local_addr).await?;

    Ok((tx, stream))
}

#[tokio::test]
async fn parse_command_array() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    let bytes = b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n";
    tx.send(bytes.to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    let expected = Some(Frame::Array(vec![
        Frame::Bulk(Bytes::from("SET")),
        Frame::Bulk(Bytes::from("mykey")),
        Frame::Bulk(Bytes::from("myvalue")),
    ]));

    assert_eq!(actual, expected);
}

#[tokio::test]
async fn parse_simple_string() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b"+OK\r\n".to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    assert_eq!(actual, Some(Frame::Simple("OK".to_string())));
}

#[tokio::test]
async fn parse_bulk_string() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b"$5\r\nhello\r\n".to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    assert_eq!(actual, Some(Frame::Bulk(Bytes::from("hello"))));
}

#[tokio::test]
async fn parse_integer() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b":1000\r\n".to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    assert_eq!(actual, Some(Frame::Integer(1000)));
}

#[tokio::test]
async fn parse_null_bulk_string() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b"$-1\r\n".to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    assert_eq!(actual, Some(Frame::Null));
}

#[tokio::test]
async fn parse_multiple_commands_sequentially() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    let array_1 = b"*3\r\n$3\r\nSET\r\n$7\r\nmykey_1\r\n$9\r\nmyvalue_1\r\n";
    let array_2 = b"*3\r\n$3\r\nSET\r\n$7\r\nmykey_2\r\n$9\r\nmyvalue_2\r\n";

    tx.send(array_1.to_vec()).unwrap();
    tx.send(array_2.to_vec()).unwrap();

    let actual = connection.read_frame().await.unwrap();
    let expected = Some(Frame::Array(vec![
        Frame::Bulk(Bytes::from("SET")),
        Frame::Bulk(Bytes::from("mykey_1")),
        Frame::Bulk(Bytes::from("myvalue_1")),
    ]));
    assert_eq!(actual, expected);

    let actual = connection.read_frame().await.unwrap();
    let expected = Some(Frame::Array(vec![
        Frame::Bulk(Bytes::from("SET")),
        Frame::Bulk(Bytes::from("mykey_2")),
        Frame::Bulk(Bytes::from("myvalue_2")),
    ]));
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn parse_incomplete_frame_waits_for_the_rest() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    // Command split into three parts to simulate partial data arrival.
    // "*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n"
    let part1 = b"*3\r\n$3\r\nSE";
    let part2 = b"T\r\n$5\r\nmyke";
    let part3 = b"y\r\n$7\r\nmyvalue\r\n";

    tokio::spawn(async move {
        let parts = vec![part1.to_vec(), part2.to_vec(), part3.to_vec()];
        for part in parts {
            tx.send(part).unwrap();
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
    });

    let actual = connection.read_frame().await.unwrap();
    let expected = Some(Frame::Array(vec![
        Frame::Bulk(Bytes::from("SET")),
        Frame::Bulk(Bytes::from("mykey")),
        Frame::Bulk(Bytes::from("myvalue")),
    ]));
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn malformed_leading_byte_is_an_error() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b"@5\r\nhello\r\n".to_vec()).unwrap();

    assert!(connection.read_frame().await.is_err());
}

#[tokio::test]
async fn clean_disconnect_is_none() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    drop(tx);

    let actual = connection.read_frame().await.unwrap();
    assert_eq!(actual, None);
}

#[tokio::test]
async fn disconnect_mid_frame_is_an_error() {
    let (tx, stream) = create_tcp_connection().await.unwrap();
    let mut connection = Connection::new(stream);

    tx.send(b"*2\r\n$3\r\nGET".to_vec()).unwrap();
    // Give the bytes time to arrive before the close.
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    drop(tx);

    assert!(connection.read_frame().await.is_err());
}

#[tokio::test]
async fn write_frame_roundtrips_through_a_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        Connection::new(socket)
    });

    let stream = TcpStream::connect(local_addr).await.unwrap();
    let mut client = Connection::new(stream);
    let mut server = accept.await.unwrap();

    client
        .write_frame(Frame::Array(vec![
            Frame::Bulk(Bytes::from("GET")),
            Frame::Bulk(Bytes::from("key")),
        ]))
        .await
        .unwrap();

    let received = server.read_frame().await.unwrap().unwrap();
    assert_eq!(
        received,
        Frame::Array(vec![
            Frame::Bulk(Bytes::from("GET")),
            Frame::Bulk(Bytes::from("key")),
        ])
    );

    server
        .write_frame(Frame::Bulk(Bytes::from("value")))
        .await
        .unwrap();

    let reply = client.read_frame().await.unwrap().unwrap();
    assert_eq!(reply, Frame::Bulk(Bytes::from("value")));
}
