//! Key hashes a native script can demand a signature from.

use pallas_primitives::conway::NativeScript;

use super::conway;
use crate::Error;

fn collect(script: &NativeScript, out: &mut Vec<String>) {
    match script {
        NativeScript::ScriptPubkey(hash) => out.push(hash.to_string()),
        NativeScript::ScriptAll(all) | NativeScript::ScriptAny(all) => {
            all.iter().for_each(|x| collect(x, out))
        }
        NativeScript::ScriptNOfK(_, all) => all.iter().for_each(|x| collect(x, out)),
        NativeScript::InvalidBefore(_) | NativeScript::InvalidHereafter(_) => (),
    }
}

/// Every `sig` leaf of a native script, in order of appearance.
pub(crate) fn key_hashes(script_cbor: &str) -> Result<Vec<String>, Error> {
    let script = conway::native_script(script_cbor)?;

    let mut out = vec![];
    collect(&script, &mut out);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_signature() {
        let kh = "11".repeat(28);
        let script = format!("8200581c{kh}");

        assert_eq!(key_hashes(&script).unwrap(), vec![kh]);
    }

    #[test]
    fn nested_any_of_with_timelock() {
        let a = "11".repeat(28);
        let b = "22".repeat(28);
        // [2, [[0, a], [3, 1, [[0, b], [5, 1000]]]]]
        let script = format!("8202828200581c{a}8303018282 00581c{b}82051903e8").replace(' ', "");

        assert_eq!(key_hashes(&script).unwrap(), vec![a, b]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(key_hashes("8209").is_err());
        assert!(key_hashes("zz").is_err());
    }
}
