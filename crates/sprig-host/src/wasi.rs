//! Write-syscall emulation.
//!
//! The guest's compiler target imports exactly one host function,
//! `wasi_unstable::fd_write`, and uses it for all program output. This
//! module implements that call purely in terms of a byte slice over
//! the instance's linear memory, so the gathering logic can be tested
//! without an engine.
//!
//! The call contract follows the WASI preview0 shape: a table of
//! `(ptr, len)` I/O vectors in guest memory, a vector count, and an
//! out-pointer that receives the number of bytes written. The emulation
//! gathers the vectors in table order, rewrites every line feed to a
//! carriage return for the display surface, and appends the result to
//! the output sink. There is no real descriptor behind `fd`; all
//! streams go to the same sink.

use tracing::trace;

use crate::error::WriteError;
use crate::sink::OutputSink;

/// Import namespace the guest must bind the syscall under.
pub const IMPORT_MODULE: &str = "wasi_unstable";

/// Import name of the syscall.
pub const IMPORT_NAME: &str = "fd_write";

/// Size in bytes of one I/O vector record in guest memory.
pub const IOVEC_SIZE: usize = 8;

/// Upper bound on the vector count accepted in one call.
///
/// The count is guest-controlled; without a bound a hostile guest
/// could request an arbitrarily large record scan. Exceeding the
/// bound traps the run.
pub const MAX_IOVS: u32 = 1024;

/// Status value returned to the guest on success.
pub const ERRNO_SUCCESS: u32 = 0;

/// The four-word invocation contract of the write syscall.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest {
    /// Stream descriptor. Accepted but not discriminated.
    pub fd: u32,
    /// Guest address of the first I/O vector record.
    pub iovs_ptr: u32,
    /// Number of records in the vector table.
    pub iovs_len: u32,
    /// Guest address that receives the total byte count, little-endian.
    pub nwritten_ptr: u32,
}

/// Emulate one blocking scatter-write against guest memory.
///
/// Gathers `iovs_len` vectors in ascending table order, applies the
/// line-feed rewrite to the gathered copy (guest memory itself is
/// never modified), appends the decoded text to `sink`, and stores the
/// pre-transform total at `nwritten_ptr`. Returns the total on
/// success.
///
/// # Errors
///
/// Any record or buffer span outside `memory`, or a vector count above
/// [`MAX_IOVS`], fails the call. The caller is expected to escalate
/// the failure to a trap rather than report a short write.
pub fn emulate_write(
    memory: &mut [u8],
    sink: &dyn OutputSink,
    req: &WriteRequest,
) -> Result<u32, WriteError> {
    if req.iovs_len > MAX_IOVS {
        return Err(WriteError::TooManyVectors {
            count: req.iovs_len,
            max: MAX_IOVS,
        });
    }

    // First pass: decode and bounds-check every record, accumulating
    // the total before materializing any output.
    let mut vectors = Vec::with_capacity(req.iovs_len as usize);
    let mut total: u32 = 0;
    for i in 0..req.iovs_len as usize {
        let record_at = (req.iovs_ptr as usize).saturating_add(i * IOVEC_SIZE);
        let record = span(memory, record_at, IOVEC_SIZE)?;

        let buf_ptr = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let buf_len = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);

        // Validate the span now so a bad vector fails the call before
        // any bytes reach the sink.
        span(memory, buf_ptr as usize, buf_len as usize)?;

        total = total
            .checked_add(buf_len)
            .ok_or(WriteError::OutOfBounds {
                offset: buf_ptr as usize,
                len: buf_len as usize,
                memory_size: memory.len(),
            })?;
        vectors.push((buf_ptr as usize, buf_len as usize));
    }

    // Second pass: gather in table order.
    let mut gathered = Vec::with_capacity(total as usize);
    for (ptr, len) in vectors {
        gathered.extend_from_slice(&memory[ptr..ptr + len]);
    }

    // The display surface treats carriage return as the line break.
    // 1:1 substitution, applied to the copy, so the byte count is
    // preserved and vector boundaries do not matter.
    for byte in &mut gathered {
        if *byte == b'\n' {
            *byte = b'\r';
        }
    }

    sink.append(&String::from_utf8_lossy(&gathered));

    let out = span_mut(memory, req.nwritten_ptr as usize, 4)?;
    out.copy_from_slice(&total.to_le_bytes());

    trace!(fd = req.fd, iovs = req.iovs_len, bytes = total, "fd_write");

    Ok(total)
}

fn span(memory: &[u8], offset: usize, len: usize) -> Result<&[u8], WriteError> {
    let end = offset.checked_add(len).ok_or(WriteError::OutOfBounds {
        offset,
        len,
        memory_size: memory.len(),
    })?;
    memory.get(offset..end).ok_or(WriteError::OutOfBounds {
        offset,
        len,
        memory_size: memory.len(),
    })
}

fn span_mut(memory: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8], WriteError> {
    let memory_size = memory.len();
    let end = offset.checked_add(len).ok_or(WriteError::OutOfBounds {
        offset,
        len,
        memory_size,
    })?;
    memory.get_mut(offset..end).ok_or(WriteError::OutOfBounds {
        offset,
        len,
        memory_size,
    })
}
