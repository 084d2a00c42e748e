#[cfg(test)]
mod tests {
    use crate::pvm::isa::ArgFamily;
    use std::collections::HashSet;

    /// Opcodes that end a basic block under the protocol.
    const EXPECTED_TERMINATORS: &[u8] = &[
        0, 1, 40, 50, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90, 170, 171, 172, 173, 174, 175,
        180,
    ];
    const EXPECTED_INSTRUCTION_COUNT: usize = 139;

    struct Entry {
        name: &'static str,
        opcode: u8,
        mnemonic: &'static str,
        family: ArgFamily,
        gas: u64,
        terminator: bool,
    }

    macro_rules! collect_isa {
          (
              $( $(#[$doc:meta])* $name:ident = $opcode:literal, $mnemonic:literal => $family:ident, $gas:expr, $terminator:literal ),* $(,)?
          ) => {{
              vec![
                  $(
                      Entry {
                          name: stringify!($name),
                          opcode: $opcode,
                          mnemonic: $mnemonic,
                          family: ArgFamily::$family,
                          gas: $gas,
                          terminator: $terminator,
                      },
                  )*
              ]
          }};
      }

    fn isa() -> Vec<Entry> {
        crate::for_each_instruction!(collect_isa)
    }

    #[test]
    fn isa_size_unchanged() {
        assert_eq!(isa().len(), EXPECTED_INSTRUCTION_COUNT);
    }

    #[test]
    fn mnemonics_and_names_unique() {
        let entries = isa();
        let mnemonics: HashSet<_> = entries.iter().map(|e| e.mnemonic).collect();
        let names: HashSet<_> = entries.iter().map(|e| e.name).collect();
        assert_eq!(mnemonics.len(), entries.len());
        assert_eq!(names.len(), entries.len());
    }

    #[test]
    fn block_terminators_match_protocol() {
        let terminators: Vec<u8> = isa()
            .iter()
            .filter(|e| e.terminator)
            .map(|e| e.opcode)
            .collect();
        assert_eq!(terminators, EXPECTED_TERMINATORS);
    }

    #[test]
    fn every_branch_carries_an_offset_or_dynamic_target() {
        for entry in isa().iter().filter(|e| e.terminator) {
            assert!(
                matches!(
                    entry.family,
                    ArgFamily::NoArgs
                        | ArgFamily::OneOffset
                        | ArgFamily::OneRegOneImm
                        | ArgFamily::OneRegImmOffset
                        | ArgFamily::TwoRegOneOffset
                        | ArgFamily::TwoRegTwoImm
                ),
                "{} has family {:?}",
                entry.mnemonic,
                entry.family
            );
        }
    }

    #[test]
    fn default_costs_are_one() {
        assert!(isa().iter().all(|e| e.gas == 1));
    }

    #[test]
    fn opcodes_ascend() {
        let entries = isa();
        assert!(entries.windows(2).all(|w| w[0].opcode < w[1].opcode));
    }
}
