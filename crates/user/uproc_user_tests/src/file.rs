//! File descriptor programs: `creat`, `open`, `read`, `write`, `close` and
//! `unlink`.

use uproc_kernel::UserEnv;
use uproc_kernel_params::{NOFILE, PAGE_SIZE};

use crate::{
    CONSOLE_LINE, GARBAGE_LEN, POEM, POEM_REPEAT, ROUNDTRIP_DATA, expect, report, uprintln,
};

const STDIN: i32 = 0;
const STDOUT: i32 = 1;

fn c_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Writes ten bytes to a file and reads them back.
///
/// Exits with the number of bytes that survived the round trip.
pub fn roundtrip(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let len = c_len(ROUNDTRIP_DATA.len());
    let fd = env.creat_file("roundtrip.txt");
    if fd < 0 {
        uprintln!(env, "roundtrip: creat failed ({fd})");
        return -1;
    }
    let data = env.alloc_bytes(ROUNDTRIP_DATA);
    let n = env.write(fd, data, len);
    env.close(fd);
    if n != len {
        uprintln!(env, "roundtrip: wrote {n} bytes");
        return -1;
    }

    let fd = env.open_file("roundtrip.txt");
    let back = env.alloc(ROUNDTRIP_DATA.len());
    let n = env.read(fd, back, len);
    env.close(fd);
    let bytes = env.load_bytes(back, ROUNDTRIP_DATA.len());
    if n != len || bytes != ROUNDTRIP_DATA {
        uprintln!(env, "roundtrip: read back {n} bytes \"{}\"", bytes.escape_ascii());
        return -1;
    }
    n
}

/// Reads a fixed line from console input.
///
/// Exits with the line length if it matches.
pub fn read_console(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let buf = env.alloc(CONSOLE_LINE.len());
    let mut total = 0;
    while total < CONSOLE_LINE.len() {
        let n = env.read(STDIN, buf + total, c_len(CONSOLE_LINE.len() - total));
        let Ok(n) = usize::try_from(n) else {
            uprintln!(env, "Failed to read std input ({n})");
            return -1;
        };
        if n == 0 {
            break;
        }
        total += n;
    }
    let line = env.load_bytes(buf, total);
    env.close(STDIN);
    if line != CONSOLE_LINE {
        uprintln!(env, "unexpected input \"{}\"", line.escape_ascii());
        return -1;
    }
    c_len(total)
}

/// Reads a single byte of `verylongfile.txt`.
pub fn read_one(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let fd = env.open_file("verylongfile.txt");
    if !(0..c_len(NOFILE)).contains(&fd) {
        uprintln!(env, "Failed to open verylongfile.txt");
        return -1;
    }
    let buf = env.alloc(1);
    let n = env.read(fd, buf, 1);
    uprintln!(env, "Bytes Read: {n}");
    env.close(fd);
    if n == 1 { 0 } else { -1 }
}

/// Reads `garbage.txt` one byte at a time until end of file.
///
/// The expected length may be given as the first argument.
pub fn read_until_eof(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let expected = env
        .args(argc, argv)
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(GARBAGE_LEN);
    let fd = env.open_file("garbage.txt");
    if fd < 0 {
        uprintln!(env, "Failed to open garbage.txt");
        return -1;
    }
    let buf = env.alloc(1);
    let mut total = 0;
    let last = loop {
        let n = env.read(fd, buf, 1);
        if n != 1 {
            break n;
        }
        total += 1;
    };
    env.close(fd);
    uprintln!(env, "Total Bytes Read: {total}");
    if last < 0 {
        uprintln!(env, "Failed to read garbage.txt ({last})");
        return -1;
    }
    if total != expected {
        uprintln!(env, "Did not read all the chars from garbage.txt");
        return -1;
    }
    0
}

/// Reads into memory the program does not own.
pub fn read_bad_buf(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let fd = env.open_file("garbage.txt");
    expect(env, &mut failures, "open garbage.txt", fd >= 0);

    let r = env.read(fd, 0, 18);
    uprintln!(env, "Bytes Read: {r}");
    expect(env, &mut failures, "read into null page", r < 0);
    let r = env.read(fd, PAGE_SIZE, 18);
    expect(env, &mut failures, "read into text segment", r < 0);
    let r = env.read(fd, usize::MAX - 4, 18);
    expect(env, &mut failures, "read past the address space", r < 0);

    // failed reads leave the offset alone
    let buf = env.alloc(8);
    let r = env.read(fd, buf, 8);
    let bytes = env.load_bytes(buf, 8);
    expect(env, &mut failures, "offset unchanged", r == 8 && bytes == b"garbage\n");

    env.close(fd);
    report(env, "readbadbuf", failures)
}

/// Uses descriptors that are out of range or not open.
pub fn read_invalid_fd(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let fd = env.open_file("garbage.txt");
    expect(env, &mut failures, "open garbage.txt", fd >= 0);
    let buf = env.alloc(4);

    let r = env.read(-1, buf, 1);
    uprintln!(env, "Bytes Read: {r}");
    expect(env, &mut failures, "read fd -1", r < 0);
    let r = env.read(c_len(NOFILE), buf, 1);
    expect(env, &mut failures, "read fd 16", r < 0);
    let r = env.read(fd + 1, buf, 1);
    expect(env, &mut failures, "read unopened fd", r < 0);
    let r = env.write(-1, buf, 1);
    expect(env, &mut failures, "write fd -1", r < 0);
    let r = env.write(c_len(NOFILE) + 100, buf, 1);
    expect(env, &mut failures, "write fd 116", r < 0);
    let r = env.close(-1);
    expect(env, &mut failures, "close fd -1", r < 0);
    let r = env.read(fd, buf, -1);
    expect(env, &mut failures, "read negative count", r < 0);
    let r = env.write(STDOUT, buf, -1);
    expect(env, &mut failures, "write negative count", r < 0);

    let r = env.read(fd, buf, 0);
    expect(env, &mut failures, "read zero bytes", r == 0);

    env.close(fd);
    report(env, "readinvalidlength", failures)
}

/// Writes [`POEM`] to console output in one call.
pub fn write_console(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let poem = env.alloc_bytes(POEM.as_bytes());
    let len = c_len(POEM.len());
    let written = env.write(STDOUT, poem, len);
    uprintln!(env, "BYTES WRITTEN: {written}");
    if written == len { 0 } else { -1 }
}

/// Writes [`POEM`] to `output.txt` one byte at a time.
pub fn write_to_file(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let fd = env.open_file("output.txt");
    let poem = env.alloc_bytes(POEM.as_bytes());
    let mut total = 0;
    for _ in 0..POEM_REPEAT {
        for i in 0..POEM.len() {
            let r = env.write(fd, poem + i, 1);
            if r != 1 {
                uprintln!(env, "failed to write character (r = {r})");
                return -1;
            }
            total += r;
        }
    }
    uprintln!(env, "total bytes written: {total}");
    env.close(fd);
    0
}

/// Fills the descriptor table.
pub fn fd_exhaust(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let mut fds = vec![];
    for i in 2..NOFILE {
        let fd = env.open_file(&format!("fd{i}.txt"));
        expect(env, &mut failures, "lowest free descriptor", fd == c_len(i));
        fds.push(fd);
    }
    uprintln!(env, "opened {} files", fds.len());

    let r = env.open_file("overflow.txt");
    expect(env, &mut failures, "open with a full table", r < 0);
    let r = env.creat_file("fd2.txt");
    expect(env, &mut failures, "creat with a full table", r < 0);

    let r = env.close(7);
    expect(env, &mut failures, "close 7", r == 0);
    let r = env.open_file("again.txt");
    expect(env, &mut failures, "closed slot is reused", r == 7);

    for fd in fds {
        let r = env.close(fd);
        expect(env, &mut failures, "close", r == 0);
    }
    report(env, "fdexhaust", failures)
}

pub fn fd_errors(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let buf = env.alloc(4);

    let fd = env.open_file("errors.txt");
    let r = env.close(fd);
    expect(env, &mut failures, "close", r == 0);
    let r = env.close(fd);
    expect(env, &mut failures, "close twice", r < 0);
    let r = env.read(fd, buf, 1);
    expect(env, &mut failures, "read closed fd", r < 0);
    let r = env.write(fd, buf, 1);
    expect(env, &mut failures, "write closed fd", r < 0);

    let r = env.write(STDIN, buf, 1);
    expect(env, &mut failures, "write console input", r < 0);
    let r = env.read(STDOUT, buf, 1);
    expect(env, &mut failures, "read console output", r < 0);

    let r = env.open_file("");
    expect(env, &mut failures, "open empty name", r < 0);
    let r = env.open_file("dir/file.txt");
    expect(env, &mut failures, "open name with slash", r < 0);
    let r = env.open_file(&"n".repeat(300));
    expect(env, &mut failures, "open overlong name", r < 0);
    let r = env.open(0);
    expect(env, &mut failures, "open null name", r < 0);

    let unterminated = env.alloc(PAGE_SIZE);
    let fill = vec![b'a'; PAGE_SIZE];
    env.store(unterminated, &fill);
    let r = env.open(unterminated);
    expect(env, &mut failures, "open unterminated name", r < 0);

    let r = env.write(STDOUT, 0, 4);
    expect(env, &mut failures, "write from null page", r < 0);

    let r = env.unlink_file("missing.txt");
    expect(env, &mut failures, "unlink missing file", r < 0);

    report(env, "fderrors", failures)
}

/// Removes a file that is still open.
pub fn unlink(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let buf = env.alloc_bytes(b"hello");

    let writer = env.creat_file("doomed.txt");
    let reader = env.open_file("doomed.txt");
    let r = env.write(writer, buf, 5);
    expect(env, &mut failures, "write", r == 5);

    let r = env.unlink_file("doomed.txt");
    expect(env, &mut failures, "unlink open file", r == 0);

    let back = env.alloc(5);
    let r = env.read(reader, back, 5);
    let bytes = env.load_bytes(back, 5);
    expect(env, &mut failures, "read after unlink", r == 5 && bytes == b"hello");
    let r = env.write(writer, buf, 5);
    expect(env, &mut failures, "write after unlink", r == 5);
    env.close(writer);
    env.close(reader);

    let fresh = env.open_file("doomed.txt");
    let r = env.read(fresh, back, 5);
    expect(env, &mut failures, "name reopens empty", r == 0);
    env.close(fresh);

    let r = env.unlink_file("doomed.txt");
    expect(env, &mut failures, "unlink recreated file", r == 0);
    let r = env.unlink_file("doomed.txt");
    expect(env, &mut failures, "unlink twice", r < 0);

    report(env, "unlink", failures)
}

pub fn creat_truncates(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let buf = env.alloc_bytes(b"abcdef");
    let back = env.alloc(6);

    let fd = env.creat_file("t.txt");
    env.write(fd, buf, 6);
    env.close(fd);

    // open keeps the contents
    let fd = env.open_file("t.txt");
    let r = env.read(fd, back, 6);
    expect(env, &mut failures, "open keeps contents", r == 6);
    env.close(fd);

    let fd = env.creat_file("t.txt");
    let r = env.read(fd, back, 6);
    expect(env, &mut failures, "creat truncates", r == 0);
    env.write(fd, buf, 2);
    env.close(fd);

    let fd = env.open_file("t.txt");
    let r = env.read(fd, back, 6);
    let bytes = env.load_bytes(back, 2);
    expect(env, &mut failures, "rewritten contents", r == 2 && bytes == b"ab");
    env.close(fd);

    report(env, "creat", failures)
}

/// Closes both console streams and reuses their slots.
///
/// Cannot print anything, so the exit status tells which step failed.
pub fn close_standard_streams(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let buf = env.alloc_bytes(b"x");
    if env.close(STDIN) != 0 {
        return 1;
    }
    if env.close(STDOUT) != 0 {
        return 2;
    }
    if env.write(STDOUT, buf, 1) >= 0 {
        return 3;
    }
    if env.open_file("std.txt") != STDIN {
        return 4;
    }
    if env.open_file("std.txt") != STDOUT {
        return 5;
    }
    if env.write(STDOUT, buf, 1) != 1 {
        return 6;
    }
    0
}

/// Unlinks a file it is still writing and ends without closing it.
///
/// With the argument `fault` it ends by touching a null pointer instead of
/// returning.
pub fn unlink_open(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let buf = env.alloc_bytes(b"data");
    let fd = env.creat_file("scratch.txt");
    if env.write(fd, buf, 4) != 4 || env.unlink_file("scratch.txt") != 0 {
        return -1;
    }
    uprintln!(env, "unlinkopen: holding fd {fd}");
    if env.args(argc, argv).get(1).is_some_and(|a| a == "fault") {
        env.store_i32(0, 42);
    }
    0
}
