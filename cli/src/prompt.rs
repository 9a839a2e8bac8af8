/*
 * prompt.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mgsieve, a ManageSieve client.
 *
 * mgsieve is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mgsieve is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mgsieve.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Interactive password prompt. On a terminal the password is read without echo; piped
//! input falls back to one line from stdin.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Prompt on the terminal and read the password with echo disabled.
/// When stdin is not a terminal, write `prompt` to stderr and read one line from stdin.
pub async fn read_password(prompt: &str) -> Result<String> {
    if std::io::stdin().is_terminal() {
        let prompt = prompt.to_string();
        return tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .context("password prompt task failed")?
            .context("cannot read password");
    }
    let mut stderr = tokio::io::stderr();
    stderr.write_all(prompt.as_bytes()).await?;
    stderr.flush().await?;
    read_password_line(BufReader::new(tokio::io::stdin())).await
}

/// One line from `reader`, terminator stripped.
async fn read_password_line<R: AsyncBufRead + Unpin>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .context("cannot read password")?;
    if n == 0 {
        bail!("no password given (stdin closed)");
    }
    Ok(strip_line_ending(&line).to_string())
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_are_stripped_once() {
        assert_eq!(strip_line_ending("secret\r\n"), "secret");
        assert_eq!(strip_line_ending("secret\n"), "secret");
        assert_eq!(strip_line_ending(" pass \n"), " pass ");
        assert_eq!(strip_line_ending("x"), "x");
    }

    #[tokio::test]
    async fn piped_password_is_first_line() {
        let input: &[u8] = b"s3cret\r\nnext\n";
        assert_eq!(read_password_line(input).await.unwrap(), "s3cret");
    }

    #[tokio::test]
    async fn empty_pipe_is_an_error() {
        let input: &[u8] = b"";
        let err = read_password_line(input).await.unwrap_err();
        assert!(err.to_string().contains("stdin closed"));
    }
}
