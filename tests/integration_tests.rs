//! End-to-end tests for segwit-multisig against the reference 2-of-2 spend

use segwit_multisig::transaction;
use segwit_multisig::*;

const KEY1: &str = "39dc0a9f0b185a2ee56349691f34716e6e0cda06a7f9707742ac113c4e2317bf";
const KEY2: &str = "5077ccd9c558b7d04a81920d38aa11b4a9f9de3b23fab45c3ef28039920fdd6d";
const MULTISIG_HEX: &str = "5221032ff8c5df0bc00fe1ac2319c3b8070d6d1e04cfbf4fedda499ae7b775185ad53b21039bbc8d24f89e5bc44c5b0d1980d6658316a6b2440023117c3c03a4975b04dd5652ae";
const FINAL_HEX: &str = "01000000000101000000000000000000000000000000000000000000000000000000000000000000000000232200204d4b11da1a44efeb2882827c0b85fbc82d30a60fccab14d032226f5428b57cb6ffffffff01a08601000000000017a914043f512301b66ffa8d73e71907e2b0b80989521587040047304402203e64841a39986e3d684752888ee17110e7877313c67d2c47391d70ec3a791e9002205342af2be9d4385bfa5bf24498f1a57d7a893bba088a931f9ae2065e898c3e6c014830450221009c5be27daa6a90db8b5e1d266078a0adc43fdfc11feb11e13a683763770b4494022072df4e7e0d767bb5ba2059d5f6114b519ffc072042d2a4a6ba8c00cb937edde301475221032ff8c5df0bc00fe1ac2319c3b8070d6d1e04cfbf4fedda499ae7b775185ad53b21039bbc8d24f89e5bc44c5b0d1980d6658316a6b2440023117c3c03a4975b04dd5652ae00000000";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reference_config() -> BuildConfig {
    BuildConfig::new(
        vec![KEY1.to_string(), KEY2.to_string()],
        MULTISIG_HEX.to_string(),
        vec![InputConfig {
            txid: "00".repeat(32),
            vout: 0,
            value: 100000,
        }],
        100000,
    )
}

#[test]
fn test_reference_spend_final_hex() -> anyhow::Result<()> {
    init_logging();
    let built = SegwitMultisig::new(Network::Mainnet).build(&reference_config())?;

    assert_eq!(built.derived.address, "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF");
    assert_eq!(built.hex, FINAL_HEX);
    assert_eq!(
        built.txid,
        "444ef9088c8a30c1ac6d61841b4da07a97cf04323c14a5f21255b4404013e0fd"
    );
    assert_eq!(
        built.wtxid,
        "01e305312c2a4236ebc3ca4bbe519c1e91233b5e2e5ae80901c55f48b00971cf"
    );
    assert_eq!(built.bytes.len(), 339);
    assert_eq!(built.weight, 693);
    assert_eq!(built.vsize, 174);
    assert_eq!(
        hex::encode(built.sighashes[0]),
        "5ef430728099efb90dfda0a177aefcc14ed06e470a93dd54e1c4d4c8f7a0aea1"
    );
    Ok(())
}

#[test]
fn test_reference_spend_structure() -> anyhow::Result<()> {
    init_logging();
    let built = builder::build(&reference_config())?;
    let input = &built.signed.inputs[0];

    // scriptSig: one push of the 34-byte witness program
    assert_eq!(input.script_sig.len(), 35);
    assert_eq!(input.script_sig[0], 34);
    assert_eq!(&input.script_sig[1..], built.derived.witness_program.as_bytes());

    // placeholder, two signatures, script
    assert_eq!(input.witness.len(), 4);
    assert!(input.witness[0].is_empty());
    assert_eq!(input.witness[3], hex::decode(MULTISIG_HEX)?);

    let output = &built.signed.outputs[0];
    assert_eq!(output.value, 100000);
    assert_eq!(output.script_pubkey.len(), 23);
    assert_eq!(output.script_pubkey[0], 0xa9);
    assert_eq!(output.script_pubkey[22], 0x87);
    Ok(())
}

#[test]
fn test_build_is_deterministic() -> anyhow::Result<()> {
    let first = builder::build(&reference_config())?;
    let second = builder::build(&reference_config())?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_signer_order_does_not_matter() -> anyhow::Result<()> {
    let mut config = reference_config();
    config.private_keys.reverse();
    let built = builder::build(&config)?;
    assert_eq!(built.hex, FINAL_HEX);
    Ok(())
}

#[test]
fn test_final_hex_parses_back() -> anyhow::Result<()> {
    let multisig = SegwitMultisig::default();
    let built = multisig.build(&reference_config())?;
    let parsed = multisig.deserialize(&hex::decode(FINAL_HEX)?)?;
    assert_eq!(parsed, built.signed);
    assert_eq!(multisig.serialize(&parsed), built.bytes);
    Ok(())
}

#[test]
fn test_reference_evaluator_accepts_parsed_tx() -> anyhow::Result<()> {
    let multisig = SegwitMultisig::default();
    let tx = transaction::from_hex(FINAL_HEX)?;
    let spk = hex::decode("a914043f512301b66ffa8d73e71907e2b0b80989521587")?;
    assert!(multisig.verify_input(&tx, 0, &spk, 100000)?);
    Ok(())
}

#[test]
fn test_swapped_signatures_fail_verification() -> anyhow::Result<()> {
    let built = builder::build(&reference_config())?;
    let mut tx = built.signed.clone();
    tx.inputs[0].witness.swap(1, 2);
    let ok = interpreter::verify_input(&tx, 0, built.derived.script_pubkey.as_bytes(), 100000)?;
    assert!(!ok);
    Ok(())
}

#[test]
fn test_missing_placeholder_fails_verification() -> anyhow::Result<()> {
    let built = builder::build(&reference_config())?;
    let mut tx = built.signed.clone();
    tx.inputs[0].witness.remove(0);
    let ok = interpreter::verify_input(&tx, 0, built.derived.script_pubkey.as_bytes(), 100000)?;
    assert!(!ok);
    Ok(())
}

#[test]
fn test_tampered_output_fails_verification() -> anyhow::Result<()> {
    let built = builder::build(&reference_config())?;
    let mut tx = built.signed.clone();
    tx.outputs[0].value -= 1;
    let ok = interpreter::verify_input(&tx, 0, built.derived.script_pubkey.as_bytes(), 100000)?;
    assert!(!ok);
    Ok(())
}

#[test]
fn test_build_from_json() -> anyhow::Result<()> {
    init_logging();
    let json = format!(
        r#"{{
            "private_keys": ["{}", "{}"],
            "multisig_script": "{}",
            "inputs": [{{ "txid": "{}", "vout": 0, "value": 100000 }}],
            "amount": 100000,
            "expected_address": "325UUecEQuyrTd28Xs2hvAxdAjHM7XzqVF"
        }}"#,
        KEY1,
        KEY2,
        MULTISIG_HEX,
        "00".repeat(32)
    );
    let built = SegwitMultisig::default().build_from_json(&json)?;
    assert_eq!(built.hex, FINAL_HEX);
    Ok(())
}

#[test]
fn test_testnet_build_changes_address_and_output() -> anyhow::Result<()> {
    let built = SegwitMultisig::new(Network::Testnet).build(&reference_config())?;
    assert!(built.derived.address.starts_with('2'));
    // Same script hash, so the locking script and signatures are unchanged
    assert_eq!(built.hex, FINAL_HEX);
    Ok(())
}

#[test]
fn test_pay_to_other_destination() -> anyhow::Result<()> {
    let mut config = reference_config();
    config.destination = Some("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy".to_string());
    config.amount = 90000;
    let built = builder::build(&config)?;
    let expected =
        address::script_pubkey_for_address(Network::Mainnet, "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy")?;
    assert_eq!(built.signed.outputs[0].script_pubkey, expected);
    assert_eq!(built.signed.outputs[0].value, 90000);
    assert_ne!(built.hex, FINAL_HEX);
    Ok(())
}
