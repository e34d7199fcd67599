/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::net::TcpListener;
use std::net::TcpStream;
use std::num::NonZeroUsize;

use tempfile::TempDir;

use crate::commands::serve::serve;
use crate::config::ServerConfiguration;
use crate::server::protocol::read_message;
use crate::server::protocol::write_message;
use crate::server::protocol::Request;
use crate::server::protocol::Response;
use crate::test::util::write_file;

#[test]
fn test_socket_round_trip_and_stop_tears_down_listener() {
    let root = TempDir::new().unwrap();
    write_file(root.path(), "a.py", "x: int = 'oops'\n");

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let mut configuration = ServerConfiguration::new(root.path().to_path_buf());
    configuration.workers = NonZeroUsize::new(2).unwrap();
    let server_thread = std::thread::spawn(move || serve(listener, configuration));

    let mut stream = TcpStream::connect(address).unwrap();
    let check = Request::TypeCheck {
        update_environment_with: vec![],
        check: vec![root.path().join("a.py")],
    };
    write_message(&mut stream, &check).unwrap();
    let response: Response = read_message(&mut stream).unwrap().unwrap();
    let Response::TypeCheck(errors) = response else {
        panic!("expected a type-check response");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.values().next().unwrap().len(), 1);

    // Stop: the response frame arrives before the listener is torn down.
    write_message(&mut stream, &Request::Stop).unwrap();
    let response: Response = read_message(&mut stream).unwrap().unwrap();
    assert_eq!(response, Response::Stop);

    server_thread.join().unwrap().unwrap();
    assert!(TcpStream::connect(address).is_err());
}

#[test]
fn test_client_connection_registers_without_a_response() {
    let root = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let mut configuration = ServerConfiguration::new(root.path().to_path_buf());
    configuration.workers = NonZeroUsize::new(2).unwrap();
    let server_thread = std::thread::spawn(move || serve(listener, configuration));

    let mut stream = TcpStream::connect(address).unwrap();
    write_message(
        &mut stream,
        &Request::ClientConnection(crate::server::protocol::Client::FileNotifier),
    )
    .unwrap();
    write_message(&mut stream, &Request::Stop).unwrap();
    // The registration produced no frame; the first response is the stop.
    let response: Response = read_message(&mut stream).unwrap().unwrap();
    assert_eq!(response, Response::Stop);
    server_thread.join().unwrap().unwrap();
}
