//! Throwaway HTTP server for unit tests.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

/// One canned response.
pub(crate) struct Reply {
    pub status_line: &'static str,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status_line: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self { status_line, headers: Vec::new(), body: body.into() }
    }

    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }
}

/// Serves `replies` in order, one connection each, on an ephemeral port.
/// Returns the base URL (`http://127.0.0.1:<port>`).
pub(crate) fn serve(replies: Vec<Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for reply in replies {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            let mut head = format!("{}\r\n", reply.status_line);
            for h in &reply.headers {
                head.push_str(h);
                head.push_str("\r\n");
            }
            head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", reply.body.len()));
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&reply.body).unwrap();
        }
    });
    format!("http://{}", addr)
}

/// Serves exactly one response.
pub(crate) fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    serve(vec![Reply::new(status_line, body)])
}
