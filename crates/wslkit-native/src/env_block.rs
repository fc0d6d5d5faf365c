//! Decoding of native environment blocks.
//!
//! `WslGetDistributionConfiguration` hands back an array of `count` pointers,
//! each addressing a NUL-terminated `KEY=VALUE` byte string. Both the array and
//! every string are allocated by the native layer and become the caller's to
//! free. [`decode_env_block`] copies every entry into owned memory, releases
//! each string right after it is copied, releases the array once every entry
//! is done, and only then returns the merged map.
//!
//! # Policy
//!
//! - An entry without `=` fails the whole decode ([`EnvBlockError::MalformedEntry`]).
//!   Every native buffer is still released.
//! - Entries are read up to [`MAX_ENV_ENTRY_LEN`] bytes. Longer (or
//!   unterminated) entries are truncated at exactly that length.
//! - Duplicate keys keep the entry with the highest index.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ffi::c_void;
use std::thread;

use tracing::{debug, warn};

use crate::error::EnvBlockError;

/// Maximum number of bytes read from a single environment entry.
pub const MAX_ENV_ENTRY_LEN: usize = 32768;

/// Owner of memory allocated by the native layer on the caller's behalf.
///
/// `Sync` because entries are released from decoder worker threads.
pub trait NativeAllocator: Sync {
    /// Give `ptr` back to the native allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator and must not have been released yet.
    unsafe fn release(&self, ptr: *mut c_void);
}

/// Releases the entry array when dropped, on every exit path.
struct BlockGuard<'a, A: NativeAllocator + ?Sized> {
    ptr: *mut *mut u8,
    alloc: &'a A,
}

impl<A: NativeAllocator + ?Sized> Drop for BlockGuard<'_, A> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the array was handed over by the caller of `decode_env_block`
            // and this guard is its only releaser.
            unsafe { self.alloc.release(self.ptr.cast()) };
        }
    }
}

/// Releases one entry string when dropped.
struct EntryGuard<'a, A: NativeAllocator + ?Sized> {
    ptr: *mut u8,
    alloc: &'a A,
}

impl<A: NativeAllocator + ?Sized> Drop for EntryGuard<'_, A> {
    fn drop(&mut self) {
        // SAFETY: each entry pointer is wrapped in exactly one guard.
        unsafe { self.alloc.release(self.ptr.cast()) };
    }
}

/// An entry pointer that can be moved to a worker thread.
#[derive(Clone, Copy)]
struct EntryPtr(*mut u8);

// SAFETY: entries are disjoint, read-only, and each is touched by one worker only.
unsafe impl Send for EntryPtr {}
unsafe impl Sync for EntryPtr {}

type DecodedEntry = Result<(String, String), EnvBlockError>;

/// Decode a native environment block into a map, releasing all native memory.
///
/// # Safety
///
/// - `block` is either null or points to `count` readable entry pointers.
/// - Every non-null entry points to memory readable up to its NUL terminator
///   or [`MAX_ENV_ENTRY_LEN`] bytes, whichever comes first.
/// - `block` and every entry were allocated by `alloc`, are owned by the
///   caller, and are not used again after this call.
pub unsafe fn decode_env_block<A>(
    block: *mut *mut u8,
    count: usize,
    alloc: &A,
) -> Result<BTreeMap<String, String>, EnvBlockError>
where
    A: NativeAllocator + ?Sized,
{
    let guard = BlockGuard { ptr: block, alloc };

    if block.is_null() {
        if count != 0 {
            warn!(count, "native layer reported environment entries without an array");
        }
        return Ok(BTreeMap::new());
    }

    // SAFETY: the caller guarantees `block` addresses `count` pointers.
    let entries: Vec<EntryPtr> = unsafe { std::slice::from_raw_parts(block, count) }
        .iter()
        .map(|&ptr| EntryPtr(ptr))
        .collect();

    let decoded = decode_entries(&entries, alloc);

    // Every worker has joined, so every entry has been released.
    drop(guard);

    merge_entries(decoded?)
}

/// Fan the entries out over scoped worker threads, in index-ordered chunks.
fn decode_entries<A>(entries: &[EntryPtr], alloc: &A) -> Result<Vec<DecodedEntry>, EnvBlockError>
where
    A: NativeAllocator + ?Sized,
{
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let workers = thread::available_parallelism()
        .map_or(4, |n| n.get())
        .min(entries.len());
    let chunk_size = entries.len().div_ceil(workers);

    debug!(entries = entries.len(), workers, "decoding environment block");

    thread::scope(|s| {
        let handles: Vec<_> = entries
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(offset, entry)| {
                            let index = chunk_index * chunk_size + offset;
                            // SAFETY: forwarded from `decode_env_block`'s contract.
                            unsafe { decode_entry(index, *entry, alloc) }
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        // Join everything before reporting, so no worker still holds native memory.
        let mut all = Vec::with_capacity(entries.len());
        let mut panicked = false;
        for handle in handles {
            match handle.join() {
                Ok(chunk_results) => all.extend(chunk_results),
                Err(_) => panicked = true,
            }
        }

        if panicked {
            Err(EnvBlockError::WorkerPanicked)
        } else {
            Ok(all)
        }
    })
}

/// Copy one entry into owned memory, release it, then split it.
///
/// # Safety
///
/// See [`decode_env_block`].
unsafe fn decode_entry<A>(index: usize, entry: EntryPtr, alloc: &A) -> DecodedEntry
where
    A: NativeAllocator + ?Sized,
{
    if entry.0.is_null() {
        return Err(EnvBlockError::NullEntry { index });
    }

    let guard = EntryGuard {
        ptr: entry.0,
        alloc,
    };
    // SAFETY: the entry is readable up to its terminator or the bound.
    let bytes = unsafe { bounded_bytes(entry.0, MAX_ENV_ENTRY_LEN) }.to_vec();
    drop(guard);

    if bytes.len() == MAX_ENV_ENTRY_LEN {
        warn!(index, limit = MAX_ENV_ENTRY_LEN, "environment entry truncated");
    }

    split_entry(index, &bytes)
}

/// The bytes of a NUL-terminated string, searching at most `max_len` bytes.
///
/// The terminator is not included. If none is found within `max_len` bytes,
/// the result is exactly `max_len` bytes long.
///
/// # Safety
///
/// `ptr` must be readable up to its terminator or `max_len` bytes, whichever
/// comes first, for the lifetime `'a`.
pub unsafe fn bounded_bytes<'a>(ptr: *const u8, max_len: usize) -> &'a [u8] {
    let mut len = 0;
    // SAFETY: reads stop at the terminator or at the bound.
    while len < max_len && unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    // SAFETY: the first `len` bytes were just read.
    unsafe { std::slice::from_raw_parts(ptr, len) }
}

fn split_entry(index: usize, bytes: &[u8]) -> DecodedEntry {
    let Some(pos) = bytes.iter().position(|&b| b == b'=') else {
        return Err(EnvBlockError::MalformedEntry {
            index,
            entry: String::from_utf8_lossy(bytes).into_owned(),
        });
    };

    Ok((
        String::from_utf8_lossy(&bytes[..pos]).into_owned(),
        String::from_utf8_lossy(&bytes[pos + 1..]).into_owned(),
    ))
}

fn merge_entries(entries: Vec<DecodedEntry>) -> Result<BTreeMap<String, String>, EnvBlockError> {
    let mut env = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry?;
        match env.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                warn!(key = %slot.key(), "duplicate environment variable, keeping the later value");
                slot.insert(value);
            }
        }
    }
    Ok(env)
}
