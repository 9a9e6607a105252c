use crate::{
    logging::audit,
    mcp::{
        host::Host,
        rpc::{self, McpResponse},
    },
};
use std::time::Instant;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{info, warn};

pub async fn serve(host: Host) -> anyhow::Result<()> {
    info!(server = %host.info().name, version = %host.info().version, "running on stdio");
    serve_io(host, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Newline-delimited JSON-RPC. Each request runs on its own task so a
/// suspended invocation never holds up the next line; responses are written
/// as they complete and correlate by id.
pub async fn serve_io<R, W>(host: Host, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() || writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    loop {
        let line = tokio::select! {
            next = lines.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let host = host.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(resp) = dispatch_line(&host, &line).await {
                match serde_json::to_string(&resp) {
                    Ok(out) => {
                        let _ = tx.send(format!("{out}\n")).await;
                    }
                    Err(e) => warn!(error = %e, "failed to encode response"),
                }
            }
        });
    }

    // in-flight tasks still hold senders; the writer drains until they finish
    drop(tx);
    let _ = writer_task.await;
    host.shutdown();
    Ok(())
}

async fn dispatch_line(host: &Host, line: &str) -> Option<McpResponse> {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let req = match rpc::parse(line) {
        Ok(req) => req,
        Err(resp) => {
            audit(&request_id, "stdio", "", "", "deny", "ParseError", started.elapsed().as_millis() as u64);
            return Some(resp);
        }
    };
    let method = req.method.clone();
    let target = rpc::target_of(&req);
    let resp = rpc::handle(host, req).await;
    let (decision, code) = rpc::summarize(resp.as_ref());
    audit(&request_id, "stdio", &method, &target, decision, &code, started.elapsed().as_millis() as u64);
    resp
}
