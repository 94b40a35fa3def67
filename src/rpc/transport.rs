//! Transporte JSON delimitado por newline.
//!
//! Cada mensagem é um objeto JSON-RPC compacto seguido de `\n`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"submit_query","params":{"query":"What is a B-tree?"}}
//! {"jsonrpc":"2.0","id":1,"result":{"answer":"...","needs_review":false,...}}
//! ```

use std::io::{BufRead, BufReader, BufWriter, Stdin, Stdout, Write};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::LoreResult;

/// Uma linha de entrada decodificada.
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// A linha não era uma requisição válida; quem chama responde com parse error.
    Malformed(String),
    Eof,
}

/// Transporte por linhas sobre qualquer par leitor/escritor.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl LineTransport<BufReader<Stdin>, BufWriter<Stdout>> {
    /// Transporte sobre stdin/stdout do processo.
    pub fn stdio() -> Self {
        Self::new(
            BufReader::new(std::io::stdin()),
            BufWriter::new(std::io::stdout()),
        )
    }
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Lê a próxima linha não vazia. Bloqueia até chegar uma.
    pub fn read_message(&mut self) -> LoreResult<Incoming> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(Incoming::Eof);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => {
                    tracing::debug!(method = %request.method, id = ?request.id, "Received request");
                    Incoming::Request(request)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unparseable message");
                    Incoming::Malformed(e.to_string())
                }
            });
        }
    }

    /// Escreve uma linha de resposta compacta e faz flush.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> LoreResult<()> {
        let body = serde_json::to_string(response)?;
        self.writer.write_all(body.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        tracing::debug!(id = ?response.id, is_error = response.is_error(), "Sent response");
        Ok(())
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::JsonRpcId;
    use serde_json::json;
    use std::io::Cursor;

    fn transport(input: &str) -> LineTransport<Cursor<Vec<u8>>, Vec<u8>> {
        LineTransport::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_reads_multiple_messages_and_skips_blank_lines() {
        let mut t = transport(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":"b","method":"store_status"}"#,
            "\n"
        ));

        match t.read_message().unwrap() {
            Incoming::Request(r) => assert_eq!(r.id, Some(JsonRpcId::Number(1))),
            other => panic!("unexpected {:?}", other),
        }
        match t.read_message().unwrap() {
            Incoming::Request(r) => assert_eq!(r.id, Some(JsonRpcId::String("b".into()))),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(t.read_message().unwrap(), Incoming::Eof));
    }

    #[test]
    fn test_invalid_json_is_malformed_not_fatal() {
        let mut t = transport("not json\n");
        assert!(matches!(t.read_message().unwrap(), Incoming::Malformed(_)));
        assert!(matches!(t.read_message().unwrap(), Incoming::Eof));
    }

    #[test]
    fn test_write_response_is_one_line() {
        let mut t = transport("");
        t.write_response(&JsonRpcResponse::success(Some(1.into()), json!({"ack": true})))
            .unwrap();

        let output = String::from_utf8(t.into_writer()).unwrap();
        assert!(output.ends_with('\n'));
        assert_eq!(output.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["result"]["ack"], json!(true));
    }
}
