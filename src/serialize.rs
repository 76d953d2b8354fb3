//! Name serialization.
//!
//! Entry ids are process-local, so names cross process boundaries as
//! strings. Two shapes are supported, both little-endian:
//!
//! - *per-instance*: one name inline in a larger stream (a length-prefixed
//!   record plus the biased numeric suffix),
//! - *batch*: a name table written once and referenced by index from the
//!   rest of a stream. The batch footer carries the precomputed folded hash
//!   of every record so a matching reader can intern without re-hashing.
//!
//! Record header (u16): bit 15 is the wide flag, bits 0..15 the length in
//! code units. Wide payloads are UTF-16 code units, each written as a
//! little-endian u16.

use {
    crate::{
        entry::{EntryId, NameView},
        error::Error,
        hash::HASH_ALGORITHM_VERSION,
        name::Name,
        pool::NamePool,
    },
    byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt},
    log::{debug, warn},
    std::io::{Read, Write},
};

/// Version of the batch stream layout. Bumped on any layout change;
/// readers reject other versions with [`Error::SerializationVersion`].
pub const STREAM_VERSION: u32 = 1;

const WIDE_FLAG: u16 = 1 << 15;

/// Writes one name inline: its base record followed by the biased suffix.
///
/// # Errors
///
/// [`Error::NumberOutOfRange`] for a numeric suffix the signed 32-bit wire
/// field cannot carry (above `i32::MAX - 1`); nothing is written in that case.
pub fn write_name<W: Write>(pool: &NamePool, name: Name, writer: &mut W) -> Result<(), Error> {
    let number_plus_one = match name.number() {
        None => 0,
        Some(number) if number < i32::MAX as u32 => number as i32 + 1,
        Some(number) => return Err(Error::NumberOutOfRange(number)),
    };

    write_record(pool.resolve(name.display_id()), writer)?;
    writer.write_i32::<LittleEndian>(number_plus_one)?;
    Ok(())
}

/// Reads one name written by [`write_name`], interning its base into `pool`.
pub fn read_name<R: Read>(pool: &NamePool, reader: &mut R) -> Result<Name, Error> {
    let (narrow, wide) = read_record(reader)?;
    let view = record_view(&narrow, &wide);

    let number_plus_one = reader.read_i32::<LittleEndian>()?;
    let number = (number_plus_one > 0).then(|| number_plus_one as u32 - 1);

    Name::from_view(pool, view, number)
}

/// Writes a batch name table: header, records, alignment padding, hashes.
///
/// `ids` become indices 0..n in the stream; the caller references names by
/// those indices elsewhere.
pub fn save_name_batch<W: Write>(
    pool: &NamePool,
    ids: &[EntryId],
    writer: &mut W,
) -> Result<(), Error> {
    writer.write_u32::<LittleEndian>(STREAM_VERSION)?;
    writer.write_u32::<LittleEndian>(ids.len() as u32)?;
    writer.write_u64::<LittleEndian>(HASH_ALGORITHM_VERSION)?;
    let mut written = 16u64;

    for &id in ids {
        written += write_record(pool.resolve(id), writer)?;
    }

    // The hash stream is u64-aligned within the batch.
    while written % 8 != 0 {
        writer.write_u8(0)?;
        written += 1;
    }

    for &id in ids {
        writer.write_u64::<LittleEndian>(pool.resolve(id).hash().value())?;
    }

    debug!("name batch: saved {} names, {written} record bytes", ids.len());

    Ok(())
}

/// Loads a batch written by [`save_name_batch`], interning every record
/// into `pool` in stream order.
///
/// Returns the index to entry id table. When the stream's hash algorithm
/// matches this build's, the precomputed hashes are used as-is; otherwise
/// every record is re-hashed.
pub fn load_name_batch<R: Read>(pool: &NamePool, reader: &mut R) -> Result<Vec<EntryId>, Error> {
    let version = reader.read_u32::<LittleEndian>()?;
    if version != STREAM_VERSION {
        return Err(Error::SerializationVersion {
            found: version,
            expected: STREAM_VERSION,
        });
    }

    let name_count = reader.read_u32::<LittleEndian>()? as usize;
    let hash_algo_version = reader.read_u64::<LittleEndian>()?;
    let mut consumed = 16u64;

    let mut records = Vec::with_capacity(name_count);
    for _ in 0..name_count {
        let record = read_record(reader)?;
        consumed += record_size(&record);
        records.push(record);
    }

    while consumed % 8 != 0 {
        reader.read_u8()?;
        consumed += 1;
    }

    let hashes_usable = hash_algo_version == HASH_ALGORITHM_VERSION;
    if !hashes_usable {
        warn!(
            "name batch: hash algorithm version {hash_algo_version} \
             (expected {HASH_ALGORITHM_VERSION}), re-hashing {name_count} names"
        );
    }

    let mut table = Vec::with_capacity(name_count);
    for record in &records {
        let hash = reader.read_u64::<LittleEndian>()?;
        let view = record_view(&record.0, &record.1);

        let id = if hashes_usable {
            pool.find_or_add_prehashed(view, hash)?
        } else {
            pool.find_or_add(view)?
        };
        table.push(id);
    }

    debug!("name batch: loaded {name_count} names");

    Ok(table)
}

/// Writes one length-prefixed record, returning the bytes written.
fn write_record<W: Write>(view: NameView<'_>, writer: &mut W) -> Result<u64, Error> {
    debug_assert!(view.len() < WIDE_FLAG as usize);

    match view {
        NameView::Ansi(units) => {
            writer.write_u16::<LittleEndian>(units.len() as u16)?;
            writer.write_all(units)?;
            Ok(2 + units.len() as u64)
        }
        NameView::Wide(units) => {
            writer.write_u16::<LittleEndian>(units.len() as u16 | WIDE_FLAG)?;
            for &unit in units {
                writer.write_u16::<LittleEndian>(unit)?;
            }
            Ok(2 + 2 * units.len() as u64)
        }
    }
}

/// A record's payload, owned. Exactly one of the buffers is in use.
type Record = (Vec<u8>, Vec<u16>);

fn read_record<R: Read>(reader: &mut R) -> Result<Record, Error> {
    let header = reader.read_u16::<LittleEndian>()?;
    let len = (header & !WIDE_FLAG) as usize;

    if header & WIDE_FLAG != 0 {
        let mut units = vec![0u16; len];
        reader.read_u16_into::<LittleEndian>(&mut units)?;
        Ok((Vec::new(), units))
    } else {
        let mut units = vec![0u8; len];
        reader.read_exact(&mut units)?;
        Ok((units, Vec::new()))
    }
}

fn record_view<'a>(narrow: &'a [u8], wide: &'a [u16]) -> NameView<'a> {
    if wide.is_empty() {
        NameView::Ansi(narrow)
    } else {
        NameView::Wide(wide)
    }
}

fn record_size(record: &Record) -> u64 {
    2 + record.0.len() as u64 + 2 * record.1.len() as u64
}
