// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use p2panda_group_session::test_utils::OutboundGroupSession;
use p2panda_group_session::{InboundGroupSession, Rng};

// Feed arbitrary bytes as message and pickle into an inbound session.
fuzz_target!(|data: &[u8]| {
    let rng = Rng::from_seed([1; 32]);
    let mut sender = OutboundGroupSession::new(&rng);

    let mut session: InboundGroupSession =
        InboundGroupSession::init(sender.session_key().as_bytes()).expect("valid session key");
    let before = session.clone();

    // Arbitrary bytes never carry a valid signature, the session must stay untouched.
    assert!(session.decrypt(data).is_err());
    assert_eq!(session, before);

    assert!(InboundGroupSession::<p2panda_group_session::Crypto>::unpickle(b"key", data).is_err());
    let _ = InboundGroupSession::<p2panda_group_session::Crypto>::import_session(data);

    // Authentic messages still decrypt afterwards.
    let message = sender.encrypt(data);
    let (plaintext, index) = session.decrypt(&message).expect("authentic message");
    assert_eq!(plaintext, data);
    assert_eq!(index, 0);
});
