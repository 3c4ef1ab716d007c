use std::io;
use std::path::Path;

use md5::Context;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// MD5 of the file's bytes as lowercase hex, the same convention the remote
/// store reports in `md5Checksum`.
pub async fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut ctx = Context::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        ctx.consume(&buf[..read]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

pub fn same_fingerprint(local: &str, remote: Option<&str>) -> bool {
    remote.is_some_and(|remote| remote.eq_ignore_ascii_case(local))
}
