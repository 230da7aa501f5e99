//! Property-based round-trip checks for the wire and out-of-band codecs.

use std::time::Duration;

use proptest::prelude::*;

use proofkit_lib::codes;
use proofkit_lib::query::{Query, QueryConstraints};
use proofkit_lib::registry::Registries;
use proofkit_lib::request::Request;
use proofkit_lib::response::{
    PassportBundle, ProofArtifact, ProofInputsBundle, Response, ResponseData,
};
use proofkit_lib::{wire, Identity};

fn constraints_strategy() -> impl Strategy<Value = QueryConstraints> {
    (
        proptest::option::of(0u8..=120),
        proptest::option::of("[A-Z]{3}"),
        proptest::option::of("[a-z0-9]{1,16}"),
        proptest::option::of(0u64..(1 << 48)),
    )
        .prop_map(|(min_age, nationality, app_id, timestamp)| QueryConstraints {
            min_age,
            nationality,
            app_id,
            timestamp,
        })
}

fn query_strategy() -> impl Strategy<Value = Query> {
    prop_oneof![
        Just(Query::RawPassport),
        constraints_strategy().prop_map(Query::ProofInputs),
        constraints_strategy().prop_map(Query::Proof),
        "[ -~]{0,32}".prop_map(|marker| Query::Dummy { marker }),
    ]
}

fn blob() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..64)
}

fn optional_blob() -> impl Strategy<Value = Option<Vec<u8>>> {
    proptest::option::of(blob())
}

fn response_data_strategy() -> impl Strategy<Value = ResponseData> {
    prop_oneof![
        (blob(), blob(), optional_blob(), optional_blob()).prop_map(|(dg1, sod, com, dg2)| {
            ResponseData::RawPassport(PassportBundle {
                dg1,
                sod,
                com,
                dg2,
                ..Default::default()
            })
        }),
        blob().prop_map(|inputs| ResponseData::ProofInputs(ProofInputsBundle { inputs })),
        (blob(), blob()).prop_map(|(proof, public_inputs)| {
            ResponseData::Proof(ProofArtifact {
                proof,
                public_inputs,
            })
        }),
        "[ -~]{0,48}".prop_map(|text| ResponseData::Dummy { text }),
    ]
}

proptest! {
    #[test]
    fn request_codec_round_trips(query in query_strategy()) {
        let registries = Registries::new(Duration::from_secs(900));
        let requester = Identity::generate();
        let request = Request::originate(&registries, &requester, query).unwrap();

        let encoded = wire::encode_request(&request).unwrap();
        let decoded = wire::decode_request(&encoded).unwrap();
        prop_assert_eq!(decoded, request);
    }

    #[test]
    fn response_codec_round_trips(query in query_strategy(), data in response_data_strategy()) {
        let registries = Registries::new(Duration::from_secs(900));
        let requester = Identity::generate();
        let request = Request::originate(&registries, &requester, query).unwrap();
        let response = Response::new(&Identity::generate(), data, request);

        let encoded = wire::encode_response(&response).unwrap();
        let decoded = wire::decode_response(&encoded).unwrap();
        prop_assert_eq!(decoded, response);
    }

    #[test]
    fn distinct_requests_get_distinct_ids(query in query_strategy()) {
        let registries = Registries::new(Duration::from_secs(900));
        let a = Request::originate(&registries, &Identity::generate(), query.clone()).unwrap();
        let b = Request::originate(&registries, &Identity::generate(), query).unwrap();
        // Ids embed a 32-byte random-origin key; collisions are negligible.
        prop_assert_ne!(a.id(), b.id());
    }

    #[test]
    fn base36_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
        let text = codes::base36_encode(&bytes);
        prop_assert_eq!(text.len(), codes::base36_encoded_len(bytes.len()));
        prop_assert_eq!(codes::base36_decode(&text).unwrap(), bytes);
    }

    #[test]
    fn transfer_hex_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
        let text = codes::to_transfer_hex(&bytes);
        prop_assert_eq!(codes::from_transfer_hex(&text).unwrap(), bytes);
    }
}
