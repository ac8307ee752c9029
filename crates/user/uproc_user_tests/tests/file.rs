#![cfg(test)]

use uproc_kernel::{KernelConfig, Outcome, Termination};
use uproc_user_tests::{POEM, POEM_REPEAT, boot, boot_with, run, seed_files};

const EXITED: Outcome = Outcome::Terminated(Termination::exited(0));

fn assert_passed(output: &str) {
    assert!(output.contains("PASSED"), "{output}");
    assert!(!output.contains("FAILED"), "{output}");
}

#[test]
fn read_one_byte() -> Result<(), anyhow::Error> {
    let kernel = boot();
    seed_files(&kernel)?;
    let (outcome, output) = run(&kernel, "readtest1.coff", &["readtest1.coff"])?;
    assert_eq!(outcome, EXITED, "{output}");
    assert!(output.contains("Bytes Read: 1"), "{output}");
    Ok(())
}

#[test]
fn read_invalid_descriptors() -> Result<(), anyhow::Error> {
    let kernel = boot();
    seed_files(&kernel)?;
    let (outcome, output) = run(
        &kernel,
        "readinvalidlength.coff",
        &["readinvalidlength.coff"],
    )?;
    assert_passed(&output);
    assert!(output.contains("Bytes Read: -"), "{output}");
    assert_eq!(outcome, EXITED);
    Ok(())
}

#[test]
fn write_to_console() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "writetest1.coff", &["writetest1.coff"])?;
    assert_eq!(outcome, EXITED, "{output}");
    assert!(output.starts_with(POEM), "{output}");
    assert!(output.contains("BYTES WRITTEN: 61"), "{output}");
    Ok(())
}

#[test]
fn write_to_file_byte_by_byte() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "writetofile.coff", &["writetofile.coff"])?;
    assert_eq!(outcome, EXITED, "{output}");
    assert!(output.contains("total bytes written: 30500"), "{output}");
    let contents = kernel.fs().contents("output.txt").unwrap();
    assert_eq!(contents, POEM.repeat(POEM_REPEAT).as_bytes());
    Ok(())
}

#[test]
fn short_write_when_store_is_full() -> Result<(), anyhow::Error> {
    let kernel = boot_with(KernelConfig::default().fs_capacity(1000));
    let (outcome, output) = run(&kernel, "writetofile.coff", &["writetofile.coff"])?;
    assert_eq!(
        outcome,
        Outcome::Terminated(Termination::exited(-1)),
        "{output}"
    );
    assert!(output.contains("failed to write character (r = -"), "{output}");
    assert_eq!(kernel.fs().contents("output.txt").unwrap().len(), 1000);
    Ok(())
}

#[test]
fn descriptor_table_is_bounded() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "fdexhaust.coff", &["fdexhaust.coff"])?;
    assert_passed(&output);
    assert!(output.contains("opened 14 files"), "{output}");
    assert_eq!(outcome, EXITED);
    assert!(!kernel.fs().exists("overflow.txt"));
    assert!(kernel.fs().exists("fd15.txt"));
    assert!(kernel.fs().exists("again.txt"));
    Ok(())
}

#[test]
fn descriptor_errors() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "fderrors.coff", &["fderrors.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, EXITED);
    assert!(!kernel.fs().exists("dir/file.txt"));
    Ok(())
}

#[test]
fn unlink_open_file() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "unlink.coff", &["unlink.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, EXITED);
    assert!(!kernel.fs().exists("doomed.txt"));
    assert_eq!(kernel.fs().used(), 0);
    Ok(())
}

#[test]
fn creat_truncates() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "creat.coff", &["creat.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, EXITED);
    assert_eq!(kernel.fs().contents("t.txt").unwrap(), b"ab");
    Ok(())
}

#[test]
fn standard_streams_can_be_closed() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "stdclose.coff", &["stdclose.coff"])?;
    assert_eq!(outcome, EXITED);
    assert!(output.is_empty(), "{output}");
    assert_eq!(kernel.fs().contents("std.txt").unwrap(), b"x");
    Ok(())
}

#[test]
fn missing_file_opens_empty() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "readtest3.coff", &["readtest3.coff", "0"])?;
    assert_eq!(outcome, EXITED, "{output}");
    assert!(output.contains("Total Bytes Read: 0"), "{output}");
    assert_eq!(kernel.fs().contents("garbage.txt").unwrap(), b"");
    Ok(())
}

#[test]
fn exit_closes_open_files() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "unlinkopen.coff", &["unlinkopen.coff"])?;
    assert_eq!(outcome, EXITED, "{output}");
    assert!(output.contains("unlinkopen: holding fd 2"), "{output}");
    assert!(!kernel.fs().exists("scratch.txt"));
    assert_eq!(kernel.fs().used(), 0);
    Ok(())
}

#[test]
fn fault_closes_open_files() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "unlinkopen.coff", &["unlinkopen.coff", "fault"])?;
    assert_eq!(outcome, Outcome::Terminated(Termination::faulted()), "{output}");
    assert!(output.contains("unlinkopen: holding fd 2"), "{output}");
    assert_eq!(kernel.fs().used(), 0);
    Ok(())
}
