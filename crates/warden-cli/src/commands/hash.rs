//! hash command - compute a password table digest

use super::CommandContext;
use anyhow::Result;
use serde::Serialize;
use warden_crypto::HashAlgorithm;

#[derive(Serialize)]
struct HashResult<'a> {
    algorithm: &'a str,
    digest: String,
}

pub fn execute(ctx: &CommandContext, algorithm: &str, password: &str) -> Result<bool> {
    let algorithm: HashAlgorithm = match algorithm.parse() {
        Ok(algorithm) => algorithm,
        Err(e) => {
            let supported: Vec<&str> = HashAlgorithm::ALL.iter().map(|a| a.name()).collect();
            ctx.error(&format!("{} (supported: {})", e, supported.join(", ")));
            return Ok(false);
        }
    };

    let digest = algorithm.digest_hex(password.as_bytes());

    if ctx.is_json() {
        ctx.print_json(&HashResult {
            algorithm: algorithm.name(),
            digest,
        })?;
    } else {
        println!("{}", digest);
    }

    Ok(true)
}
