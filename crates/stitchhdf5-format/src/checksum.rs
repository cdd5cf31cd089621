//! HDF5 metadata checksum: Jenkins lookup3 `hashlittle`.
//!
//! HDF5 checksums metadata blocks (including the virtual dataset global
//! heap block) with Bob Jenkins' lookup3 hash, not CRC32C.

/// Compute the Jenkins lookup3 checksum of a byte slice.
///
/// Matches `H5_checksum_lookup3` in the HDF5 C library with an initial
/// value of zero.
pub fn jenkins_lookup3(data: &[u8]) -> u32 {
    let seed = 0xdeadbeefu32.wrapping_add(data.len() as u32);
    let mut state = [seed, seed, seed];

    let mut rest = data;
    // All full 12-byte blocks except the last are mixed; the final block,
    // full or partial, goes through the finalization round instead.
    while rest.len() > 12 {
        for (w, word) in state.iter_mut().zip(rest.chunks(4)) {
            *w = w.wrapping_add(le_word(word));
        }
        mix(&mut state);
        rest = &rest[12..];
    }

    if rest.is_empty() {
        return state[2];
    }

    // Bytes past the end contribute zero, so a zero-padded tail block is
    // equivalent to lookup3's length switch.
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    for (w, word) in state.iter_mut().zip(tail.chunks(4)) {
        *w = w.wrapping_add(le_word(word));
    }
    final_mix(&mut state);
    state[2]
}

fn le_word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn mix(s: &mut [u32; 3]) {
    let [mut a, mut b, mut c] = *s;
    a = a.wrapping_sub(c); a ^= c.rotate_left(4);  c = c.wrapping_add(b);
    b = b.wrapping_sub(a); b ^= a.rotate_left(6);  a = a.wrapping_add(c);
    c = c.wrapping_sub(b); c ^= b.rotate_left(8);  b = b.wrapping_add(a);
    a = a.wrapping_sub(c); a ^= c.rotate_left(16); c = c.wrapping_add(b);
    b = b.wrapping_sub(a); b ^= a.rotate_left(19); a = a.wrapping_add(c);
    c = c.wrapping_sub(b); c ^= b.rotate_left(4);  b = b.wrapping_add(a);
    *s = [a, b, c];
}

fn final_mix(s: &mut [u32; 3]) {
    let [mut a, mut b, mut c] = *s;
    c ^= b; c = c.wrapping_sub(b.rotate_left(14));
    a ^= c; a = a.wrapping_sub(c.rotate_left(11));
    b ^= a; b = b.wrapping_sub(a.rotate_left(25));
    c ^= b; c = c.wrapping_sub(b.rotate_left(16));
    a ^= c; a = a.wrapping_sub(c.rotate_left(4));
    b ^= a; b = b.wrapping_sub(a.rotate_left(14));
    c ^= b; c = c.wrapping_sub(b.rotate_left(24));
    *s = [a, b, c];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        // Zero-length input skips both mixing rounds.
        assert_eq!(jenkins_lookup3(&[]), 0xdeadbeef);
    }

    #[test]
    fn deterministic() {
        let data = b"virtual dataset heap block";
        assert_eq!(jenkins_lookup3(data), jenkins_lookup3(data));
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(jenkins_lookup3(b"aaaa"), jenkins_lookup3(b"aaab"));
        assert_ne!(jenkins_lookup3(b"a"), jenkins_lookup3(b"aa"));
    }

    #[test]
    fn full_block_boundary() {
        // 12 and 13 bytes exercise the tail-only and mix+tail paths.
        let twelve = [7u8; 12];
        let thirteen = [7u8; 13];
        assert_ne!(jenkins_lookup3(&twelve), jenkins_lookup3(&thirteen));
    }

    #[test]
    fn trailing_zero_changes_hash() {
        // Padding is length-aware: explicit trailing zeros still count.
        assert_ne!(jenkins_lookup3(b"abc"), jenkins_lookup3(b"abc\0"));
    }
}
