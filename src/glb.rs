use anyhow::{anyhow, Result};

/// Magic bytes at the start of every binary glTF container.
pub const MAGIC: &[u8; 4] = b"glTF";
/// Container version written by [`encode`].
pub const VERSION: u32 = 2;

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Decoded binary glTF container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Glb {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

/// Packs a JSON document and an optional binary payload into a GLB file.
///
/// The JSON chunk is padded with spaces and the binary chunk with zeros so
/// that every chunk starts on a four byte boundary.
pub fn encode(json: &[u8], bin: Option<&[u8]>) -> Result<Vec<u8>> {
    let json_len = padded_len(json.len());
    let bin_len = bin.map(|data| padded_len(data.len()));
    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_len
        + bin_len.map_or(0, |len| CHUNK_HEADER_LEN + len);
    let total = u32::try_from(total).map_err(|_| anyhow!("GLB exceeds 4 GiB ({total} bytes)"))?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());

    write_chunk(&mut out, CHUNK_JSON, json, json_len, b' ');
    if let (Some(data), Some(len)) = (bin, bin_len) {
        write_chunk(&mut out, CHUNK_BIN, data, len, 0);
    }
    Ok(out)
}

/// Splits a GLB file into its JSON and binary chunks.
pub fn decode(data: &[u8]) -> Result<Glb> {
    if data.len() < HEADER_LEN {
        return Err(anyhow!(
            "GLB too small to contain header (len={})",
            data.len()
        ));
    }
    if &data[..4] != MAGIC {
        return Err(anyhow!(
            "invalid GLB magic: expected glTF, found {:?}",
            &data[..4]
        ));
    }
    let mut cursor = 4;
    let version = read_u32(data, &mut cursor)?;
    if version != VERSION {
        return Err(anyhow!("unsupported GLB version {version}"));
    }
    let declared = read_u32(data, &mut cursor)? as usize;
    if declared != data.len() {
        return Err(anyhow!(
            "GLB header declares {declared} bytes but file has {}",
            data.len()
        ));
    }

    let mut glb = Glb::default();
    let mut first = true;
    while cursor < data.len() {
        let length = read_u32(data, &mut cursor)? as usize;
        let kind = read_u32(data, &mut cursor)?;
        let end = cursor
            .checked_add(length)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| anyhow!("GLB chunk at {cursor} extends past end of file"))?;
        let payload = data[cursor..end].to_vec();
        match kind {
            CHUNK_JSON if first => glb.json = payload,
            CHUNK_JSON => return Err(anyhow!("GLB contains more than one JSON chunk")),
            CHUNK_BIN if !first && glb.bin.is_none() => glb.bin = Some(payload),
            _ if first => return Err(anyhow!("GLB must start with a JSON chunk")),
            // Unknown chunk types are skipped.
            _ => {}
        }
        first = false;
        cursor = end;
    }

    if first {
        return Err(anyhow!("GLB has no JSON chunk"));
    }
    Ok(glb)
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn write_chunk(out: &mut Vec<u8>, kind: u32, data: &[u8], padded: usize, fill: u8) {
    out.extend_from_slice(&(padded as u32).to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(data);
    out.resize(out.len() + (padded - data.len()), fill);
}

fn read_u32(data: &[u8], cursor: &mut usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(*cursor..*cursor + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| anyhow!("unexpected end of GLB while reading 32-bit value"))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(bytes))
}
