use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use wallgallery::codec;

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

pub fn cmd_encode(file: Option<&Path>) -> Result<()> {
    let plain = read_input(file)?;
    println!("{}", codec::encode(plain.trim_end_matches(['\r', '\n'])));
    Ok(())
}

pub fn cmd_decode(file: Option<&Path>) -> Result<()> {
    let cipher = read_input(file)?;
    let plain = codec::decode(cipher.trim()).context("Input is not a valid catalog blob")?;
    println!("{}", plain);
    Ok(())
}
