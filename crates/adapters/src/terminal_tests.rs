// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn shell_spawn(dir: &Path) -> TerminalSpawn {
    TerminalSpawn {
        kind: TerminalKind::Shell,
        session_name: "test".into(),
        cwd: dir.to_path_buf(),
        cols: 80,
        rows: 24,
        tab_name: None,
        env_file: None,
    }
}

async fn read_until(rx: &mut tokio::sync::mpsc::Receiver<Vec<u8>>, needle: &str) -> String {
    let mut collected = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let chunk = tokio::time::timeout_at(deadline, rx.recv()).await;
        match chunk {
            Ok(Some(bytes)) => {
                collected.push_str(&String::from_utf8_lossy(&bytes));
                if collected.contains(needle) {
                    return collected;
                }
            }
            Ok(None) => return collected,
            Err(_) => return collected,
        }
    }
}

#[tokio::test]
async fn shell_terminal_echoes_input() {
    let dir = tempfile::tempdir().unwrap();
    let (terminal, mut rx) = Terminal::spawn(&shell_spawn(dir.path())).unwrap();

    terminal.write_input(b"echo agor-$((40+2))\n").unwrap();
    let output = read_until(&mut rx, "agor-42").await;
    assert!(output.contains("agor-42"), "pty output: {output:?}");

    terminal.resize(120, 40).unwrap();
    terminal.kill();
}

#[tokio::test]
async fn killed_terminal_closes_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let (terminal, mut rx) = Terminal::spawn(&shell_spawn(dir.path())).unwrap();
    terminal.kill();

    // Stream drains to None once the child is gone.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(_) => panic!("pty stream did not close after kill"),
        }
    }
}
