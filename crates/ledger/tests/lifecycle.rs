//! End-to-end scenarios driven through the engine lifecycle contract:
//! genesis validator emission, the commit/reveal/result round, and the
//! epoch-boundary candidate rebuild.

use nebulink_ledger::{
    Application, BlockHeader, InitValidator, LedgerApp, LedgerDb, Scheduler, CODE_NOT_FOUND,
    CODE_OK,
};
use nebulink_types::{
    pulse_commit_hash, ChainType, Consul, ConsulPubKey, Genesis, KeyPair, NebulaId, NebulaInfo,
    OraclesPubKey, Transaction, TxFunc, TxValue, Vote,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn new_app(dir: &TempDir, consuls_count: u32) -> LedgerApp {
    let db = LedgerDb::open(dir.path()).unwrap();
    let genesis = Genesis {
        consuls_count,
        bft_oracle_in_nebula_count: 5,
        oracles_address_by_validator: Default::default(),
    };
    let scheduler = Scheduler::new(
        ConsulPubKey([0xEE; 32]),
        None,
        CancellationToken::new(),
    );
    LedgerApp::new(db, genesis, scheduler)
}

fn deliver(app: &mut LedgerApp, tx: &Transaction) -> u32 {
    app.deliver_tx(&tx.encode()).code
}

#[test]
fn test_genesis_validator_emission_skips_zero_power() {
    // S1: ConsulsCount=3, validators [(A,10),(B,5),(C,0)] -> updates [(A,10),(B,5)].
    let dir = TempDir::new().unwrap();
    let mut app = new_app(&dir, 3);

    let a = ConsulPubKey([0xAA; 32]);
    let b = ConsulPubKey([0xBB; 32]);
    let c = ConsulPubKey([0xCC; 32]);
    app.init_chain(&[
        InitValidator { pub_key: a, power: 10 },
        InitValidator { pub_key: b, power: 5 },
        InitValidator { pub_key: c, power: 0 },
    ]);

    app.begin_block(BlockHeader { height: 1 });
    let updates = app.end_block(1);
    app.commit();

    let emitted: Vec<(ConsulPubKey, u64)> =
        updates.iter().map(|u| (u.pub_key, u.power)).collect();
    assert_eq!(emitted, vec![(a, 10), (b, 5)]);
}

/// Drive a chain to the point where `oracle` is in the nebula's active
/// subset, returning the app ready for round transactions.
fn setup_round(dir: &TempDir, keypair: &KeyPair, nebula: NebulaId, oracle: OraclesPubKey) -> LedgerApp {
    let mut app = new_app(dir, 3);
    app.init_chain(&[InitValidator {
        pub_key: keypair.public(),
        power: 10,
    }]);

    app.begin_block(BlockHeader { height: 1 });

    let info = NebulaInfo {
        chain_type: ChainType::Ethereum,
        owner: keypair.public(),
        max_pulse_count_in_block: 10,
        min_score: 0,
    };
    let set_nebula = Transaction::build(
        keypair,
        TxFunc::SetNebula,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::bytes(serde_json::to_vec(&info).unwrap()),
        ],
    );
    assert_eq!(deliver(&mut app, &set_nebula), CODE_OK);

    let add_oracle = Transaction::build(
        keypair,
        TxFunc::AddOracle,
        vec![
            TxValue::bytes(vec![ChainType::Ethereum.as_byte()]),
            TxValue::bytes(oracle.as_bytes().to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &add_oracle), CODE_OK);

    let join_nebula = Transaction::build(
        keypair,
        TxFunc::AddOracleInNebula,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::bytes(oracle.as_bytes().to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &join_nebula), CODE_OK);

    app.end_block(1);
    app.commit();

    // Next score boundary selects the nebula's active oracle subset.
    app.begin_block(BlockHeader { height: 200 });
    app.end_block(200);
    app.commit();

    app
}

#[test]
fn test_commit_reveal_result_round_trip() {
    // S2: commit, matching reveal, signed result, visible via `results`.
    let dir = TempDir::new().unwrap();
    let keypair = KeyPair::from_seed([1u8; 32]);
    let nebula = NebulaId([7u8; 32]);
    let oracle = OraclesPubKey([2u8; 33]);
    let mut app = setup_round(&dir, &keypair, nebula, oracle);

    app.begin_block(BlockHeader { height: 201 });

    let preimage = b"price:1337";
    let hash = pulse_commit_hash(preimage, &oracle, 7, &nebula);
    let commit = Transaction::build(
        &keypair,
        TxFunc::Commit,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::int(7),
            TxValue::bytes(oracle.as_bytes().to_vec()),
            TxValue::bytes(hash.to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &commit), CODE_OK);

    let reveal = Transaction::build(
        &keypair,
        TxFunc::Reveal,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::int(7),
            TxValue::bytes(oracle.as_bytes().to_vec()),
            TxValue::bytes(preimage.to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &reveal), CODE_OK);

    let sign_result = Transaction::build(
        &keypair,
        TxFunc::SignResult,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::int(7),
            TxValue::bytes(oracle.as_bytes().to_vec()),
            TxValue::bytes(b"sigma".to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &sign_result), CODE_OK);

    app.end_block(201);
    app.commit();

    let rq = serde_json::json!({ "nebula_id": nebula, "pulse_id": 7 });
    let response = app.query("results", &serde_json::to_vec(&rq).unwrap());
    assert_eq!(response.code, CODE_OK);
    let results: Vec<String> = serde_json::from_slice(&response.value).unwrap();
    assert_eq!(results, vec![base64_of(b"sigma")]);

    assert_eq!(app.info().last_block_height, 201);
}

#[test]
fn test_reveal_mismatch_rejected_and_storage_unchanged() {
    // S3: commit H then reveal Y with a different hash -> 500, no reveal row.
    let dir = TempDir::new().unwrap();
    let keypair = KeyPair::from_seed([1u8; 32]);
    let nebula = NebulaId([7u8; 32]);
    let oracle = OraclesPubKey([2u8; 33]);
    let mut app = setup_round(&dir, &keypair, nebula, oracle);

    app.begin_block(BlockHeader { height: 201 });

    let hash = pulse_commit_hash(b"honest", &oracle, 7, &nebula);
    let commit = Transaction::build(
        &keypair,
        TxFunc::Commit,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::int(7),
            TxValue::bytes(oracle.as_bytes().to_vec()),
            TxValue::bytes(hash.to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &commit), CODE_OK);

    let reveal = Transaction::build(
        &keypair,
        TxFunc::Reveal,
        vec![
            TxValue::bytes(nebula.as_bytes().to_vec()),
            TxValue::int(7),
            TxValue::bytes(oracle.as_bytes().to_vec()),
            TxValue::bytes(b"dishonest".to_vec()),
        ],
    );
    assert_eq!(deliver(&mut app, &reveal), 500);

    app.end_block(201);
    app.commit();

    let rq = serde_json::json!({
        "nebula_id": nebula,
        "pulse_id": 7,
        "oracle_pub_key": oracle,
    });
    let response = app.query("reveal", &serde_json::to_vec(&rq).unwrap());
    assert_eq!(response.code, CODE_NOT_FOUND);
}

#[test]
fn test_epoch_boundary_candidate_ordering() {
    // S5: scores {A:30,B:30,C:10}, A.bytes > B.bytes, ConsulsCount=2 -> [A,B].
    let dir = TempDir::new().unwrap();
    let mut app = new_app(&dir, 2);

    let keypair = KeyPair::from_seed([1u8; 32]);
    let a = ConsulPubKey([0xAA; 32]);
    let b = ConsulPubKey([0x55; 32]);
    let c = ConsulPubKey([0x11; 32]);
    app.init_chain(&[
        InitValidator { pub_key: a, power: 30 },
        InitValidator { pub_key: b, power: 30 },
        InitValidator { pub_key: c, power: 10 },
    ]);

    app.begin_block(BlockHeader { height: 1 });
    // An incoming vote keeps C at 10: contribution min(voter, 10) from an
    // unscored voter is dropped entirely.
    let vote = Transaction::build(
        &keypair,
        TxFunc::Vote,
        vec![TxValue::bytes(
            serde_json::to_vec(&[Vote { pub_key: c, score: 10 }]).unwrap(),
        )],
    );
    assert_eq!(deliver(&mut app, &vote), CODE_OK);
    app.end_block(1);
    app.commit();

    app.begin_block(BlockHeader { height: 200 });
    app.end_block(200);
    app.commit();

    let response = app.query("consulsCandidate", b"");
    assert_eq!(response.code, CODE_OK);
    let candidate: Vec<Consul> = serde_json::from_slice(&response.value).unwrap();
    assert_eq!(candidate.len(), 2);
    assert_eq!(candidate[0].pub_key, a);
    assert_eq!(candidate[1].pub_key, b);
}

fn base64_of(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(bytes)
}
