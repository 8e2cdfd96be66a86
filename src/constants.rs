//! Protocol constants for P2SH-P2WSH multisig spends

/// Maximum size of a single pushed stack element (and of a witness script)
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of stack items during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations in a script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Largest key count expressible with the small-integer opcodes OP_1..OP_16
pub const MAX_MULTISIG_KEYS: usize = 16;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Default transaction version
pub const DEFAULT_TX_VERSION: u32 = 1;

/// Default lock time: spendable immediately
pub const DEFAULT_LOCK_TIME: u32 = 0;

/// Segwit serialization marker byte, written after the version
pub const SEGWIT_MARKER: u8 = 0x00;

/// Segwit serialization flag byte, written after the marker
pub const SEGWIT_FLAG: u8 = 0x01;

/// Base58check version byte for mainnet P2SH addresses
pub const P2SH_VERSION_MAINNET: u8 = 0x05;

/// Base58check version byte for testnet and regtest P2SH addresses
pub const P2SH_VERSION_TESTNET: u8 = 0xc4;

/// Length of a compressed secp256k1 public key
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Length of a raw private key scalar
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Length of a version-0 P2WSH witness program (0x00 0x20 <32 bytes>)
pub const P2WSH_PROGRAM_SIZE: usize = 34;

/// The secp256k1 curve order n
pub const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// floor(n / 2): the largest S value allowed by the low-S rule
pub const HALF_CURVE_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d,
    0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

// Opcodes used by the multisig templates and the reference evaluator
pub const OP_0: u8 = 0x00;
pub const OP_PUSHBYTES_MAX: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
