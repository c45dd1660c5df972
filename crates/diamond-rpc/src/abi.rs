//! Just enough ABI encoding for the diamond surface
//!
//! ```text
//! facets()                                             0x7a0ed627
//!   -> (address facetAddress, bytes4[] functionSelectors)[]
//! diamondCut((address,uint8,bytes4[])[],address,bytes) 0x1f931c1c
//! ```

use diamond_artifact::{Address, Selector};
use diamond_cut::{FacetCut, InitCall};
use diamond_snapshot::{LedgerError, LiveFacet};

/// `facets()`
pub const FACETS: [u8; 4] = [0x7a, 0x0e, 0xd6, 0x27];

/// `diamondCut((address,uint8,bytes4[])[],address,bytes)`
pub const DIAMOND_CUT: [u8; 4] = [0x1f, 0x93, 0x1c, 0x1c];

const WORD: usize = 32;

fn uint_word(v: usize) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[WORD - 8..].copy_from_slice(&(v as u64).to_be_bytes());
    w
}

fn address_word(a: &Address) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[12..].copy_from_slice(a.as_bytes());
    w
}

fn selector_word(s: &Selector) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[..4].copy_from_slice(s.as_bytes());
    w
}

/// Dynamic `(address,uint8,bytes4[])` tuple
fn encode_cut(cut: &FacetCut) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD * (4 + cut.selectors.len()));
    out.extend(address_word(&cut.facet_address));
    out.extend(uint_word(usize::from(cut.action.as_u8())));
    out.extend(uint_word(3 * WORD));
    out.extend(uint_word(cut.selectors.len()));
    for sel in &cut.selectors {
        out.extend(selector_word(sel));
    }
    out
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let padded = data.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend(uint_word(data.len()));
    out.extend_from_slice(data);
    out.resize(WORD + padded, 0);
    out
}

/// Calldata for `diamondCut(cuts, init.address, init.calldata)`
#[must_use]
pub fn encode_diamond_cut(cuts: &[FacetCut], init: &InitCall) -> Vec<u8> {
    let tuples: Vec<Vec<u8>> = cuts.iter().map(encode_cut).collect();

    let mut array = Vec::new();
    array.extend(uint_word(cuts.len()));
    let mut offset = WORD * tuples.len();
    for t in &tuples {
        array.extend(uint_word(offset));
        offset += t.len();
    }
    for t in &tuples {
        array.extend_from_slice(t);
    }

    let mut out = Vec::with_capacity(4 + 3 * WORD + array.len());
    out.extend(DIAMOND_CUT);
    out.extend(uint_word(3 * WORD));
    out.extend(address_word(&init.address));
    out.extend(uint_word(3 * WORD + array.len()));
    out.extend(array);
    out.extend(encode_bytes(&init.calldata));
    out
}

/// Bounds-checked reader over return data
struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn word(&self, at: usize) -> Result<&'a [u8], LedgerError> {
        at.checked_add(WORD)
            .and_then(|end| self.data.get(at..end))
            .ok_or_else(|| LedgerError::Decode(format!("return data truncated at byte {at}")))
    }

    fn uint(&self, at: usize) -> Result<usize, LedgerError> {
        let w = self.word(at)?;
        if w[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(LedgerError::Decode(format!("oversized integer at byte {at}")));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&w[WORD - 8..]);
        usize::try_from(u64::from_be_bytes(be))
            .map_err(|_| LedgerError::Decode(format!("integer out of range at byte {at}")))
    }

    fn address(&self, at: usize) -> Result<Address, LedgerError> {
        let w = self.word(at)?;
        Address::from_slice(&w[12..]).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    fn selector(&self, at: usize) -> Result<Selector, LedgerError> {
        let w = self.word(at)?;
        Ok(Selector::new([w[0], w[1], w[2], w[3]]))
    }
}

/// Decode the return data of `facets()`
///
/// # Errors
/// Returns [`LedgerError::Decode`] on malformed data
pub fn decode_facets(data: &[u8]) -> Result<Vec<LiveFacet>, LedgerError> {
    let d = Decoder { data };
    let array = d.uint(0)?;
    let count = d.uint(array)?;
    let base = offset(array, 1, WORD)?;

    let mut facets = Vec::with_capacity(count.min(256));
    for i in 0..count {
        let tuple = offset(base, 1, d.uint(offset(base, i, WORD)?)?)?;
        let address = d.address(tuple)?;
        let list = offset(tuple, 1, d.uint(offset(tuple, 1, WORD)?)?)?;
        let n = d.uint(list)?;
        let selectors = (1..=n)
            .map(|j| d.selector(offset(list, j, WORD)?))
            .collect::<Result<Vec<_>, _>>()?;
        facets.push(LiveFacet { address, selectors });
    }
    Ok(facets)
}

/// `start + count * size`, failing instead of wrapping on hostile offsets
fn offset(start: usize, count: usize, size: usize) -> Result<usize, LedgerError> {
    count
        .checked_mul(size)
        .and_then(|span| start.checked_add(span))
        .ok_or_else(|| LedgerError::Decode(format!("offset overflow past byte {start}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_cut::FacetCutAction;
    use pretty_assertions::assert_eq;

    fn words(data: &[u8]) -> Vec<String> {
        data.chunks(WORD).map(hex::encode).collect()
    }

    #[test]
    fn selectors_match_signatures() {
        assert_eq!(Selector::new(FACETS), Selector::from_signature("facets()"));
        assert_eq!(
            Selector::new(DIAMOND_CUT),
            Selector::from_signature("diamondCut((address,uint8,bytes4[])[],address,bytes)")
        );
    }

    #[test]
    fn encodes_single_remove_without_init() {
        let sel = Selector::new([0xaa, 0xbb, 0xcc, 0xdd]);
        let cut = FacetCut {
            facet_address: Address::ZERO,
            action: FacetCutAction::Remove,
            selectors: vec![sel],
        };
        let data = encode_diamond_cut(&[cut], &InitCall::none());
        assert_eq!(&data[..4], &DIAMOND_CUT);

        let w = words(&data[4..]);
        let int = |v: usize| hex::encode(uint_word(v));
        assert_eq!(w[0], int(0x60)); // cuts offset
        assert_eq!(w[1], int(0)); // init address
        assert_eq!(w[2], int(0x60 + 7 * 32)); // calldata offset
        assert_eq!(w[3], int(1)); // cuts length
        assert_eq!(w[4], int(0x20)); // first tuple offset
        assert_eq!(w[5], int(0)); // facet address
        assert_eq!(w[6], int(2)); // action
        assert_eq!(w[7], int(0x60)); // selectors offset
        assert_eq!(w[8], int(1)); // selectors length
        assert_eq!(w[9], format!("aabbccdd{}", "0".repeat(56)));
        assert_eq!(w[10], int(0)); // empty calldata
        assert_eq!(w.len(), 11);
    }

    #[test]
    fn init_calldata_is_padded() {
        let init = InitCall {
            address: Address::new([0x11; 20]),
            calldata: vec![0xde, 0xad, 0xbe, 0xef, 0x01],
        };
        let data = encode_diamond_cut(&[], &init);
        let w = words(&data[4..]);
        assert_eq!(w[1], format!("{}{}", "0".repeat(24), "11".repeat(20)));
        assert_eq!(w[2], hex::encode(uint_word(0x80)));
        assert_eq!(w[3], hex::encode(uint_word(0)));
        assert_eq!(w[4], hex::encode(uint_word(5)));
        assert_eq!(w[5], format!("deadbeef01{}", "0".repeat(54)));
        assert_eq!((data.len() - 4) % WORD, 0);
    }

    #[test]
    fn decodes_facets_return_data() {
        // two facets: 0x11.. with [a, b], 0x22.. with [c]
        let a = Selector::new([1, 2, 3, 4]);
        let b = Selector::new([5, 6, 7, 8]);
        let c = Selector::new([9, 10, 11, 12]);
        let tuple = |addr: u8, sels: &[Selector]| {
            let mut t = Vec::new();
            t.extend(address_word(&Address::new([addr; 20])));
            t.extend(uint_word(0x40));
            t.extend(uint_word(sels.len()));
            for s in sels {
                t.extend(selector_word(s));
            }
            t
        };
        let t1 = tuple(0x11, &[a, b]);
        let t2 = tuple(0x22, &[c]);

        let mut data = Vec::new();
        data.extend(uint_word(0x20));
        data.extend(uint_word(2));
        data.extend(uint_word(0x40));
        data.extend(uint_word(0x40 + t1.len()));
        data.extend(&t1);
        data.extend(&t2);

        let facets = decode_facets(&data).unwrap();
        assert_eq!(
            facets,
            vec![
                LiveFacet { address: Address::new([0x11; 20]), selectors: vec![a, b] },
                LiveFacet { address: Address::new([0x22; 20]), selectors: vec![c] },
            ]
        );
    }

    #[test]
    fn truncated_data_is_a_decode_error() {
        let mut data = Vec::new();
        data.extend(uint_word(0x20));
        data.extend(uint_word(3));
        assert!(matches!(decode_facets(&data), Err(LedgerError::Decode(_))));
        assert!(matches!(decode_facets(&[]), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn huge_offsets_are_a_decode_error() {
        let mut max = [0u8; WORD];
        max[WORD - 8..].copy_from_slice(&u64::MAX.to_be_bytes());

        let mut data = Vec::new();
        data.extend(uint_word(0x20));
        data.extend(uint_word(1));
        data.extend(max);
        assert!(matches!(decode_facets(&data), Err(LedgerError::Decode(_))));

        let mut data = Vec::new();
        data.extend(max);
        assert!(matches!(decode_facets(&data), Err(LedgerError::Decode(_))));
    }
}
