//! Multi-node scenarios: servers running on their own threads, talking over
//! the in-process transport or loopback TCP.

use authority_chain::core::{Block, Blockchain, Transaction};
use authority_chain::network::{
    LocalTransport, PeerManager, Server, ServerHandle, ServerOpts, TcpTransport, Transport,
};
use authority_chain::wallet::Wallet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

struct RunningNode {
    handle: ServerHandle,
    chain: Arc<Blockchain>,
    peers: Arc<PeerManager>,
    thread: JoinHandle<authority_chain::Result<()>>,
}

impl RunningNode {
    fn start(server: Server) -> RunningNode {
        RunningNode {
            handle: server.handle(),
            chain: server.chain(),
            peers: server.peers(),
            thread: thread::spawn(move || server.start()),
        }
    }

    fn peer_count(&self) -> usize {
        self.peers.get_connected_count().unwrap_or(0)
    }

    fn stop(self) {
        self.handle.shutdown();
        self.thread.join().unwrap().unwrap();
    }
}

fn opts(id: &str, transport: Arc<dyn Transport>) -> ServerOpts {
    let mut opts = ServerOpts::new(id).with_transport(transport);
    opts.sync_interval = Duration::from_millis(100);
    opts
}

fn extend(chain: &Blockchain, wallet: &Wallet, count: u32) {
    for i in 0..count {
        let tip = chain.get_header(chain.height()).unwrap();
        let mut tx = Transaction::new(format!("tx-{i}").into_bytes());
        tx.sign(&Wallet::new().unwrap()).unwrap();
        let mut block = Block::new_block_from_prev_header(&tip, vec![tx]).unwrap();
        block.sign(wallet).unwrap();
        chain.add_block(&block).unwrap();
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn same_chain(a: &Blockchain, b: &Blockchain) -> bool {
    a.height() == b.height()
        && (0..=a.height()).all(|h| a.get_header(h).ok() == b.get_header(h).ok())
}

#[test]
fn test_behind_node_catches_up_over_local_transport() {
    let tr_a = LocalTransport::new("A");
    let tr_b = LocalTransport::new("B");
    let a = Server::new(opts("A", tr_a.clone())).unwrap();
    let b = Server::new(opts("B", tr_b.clone())).unwrap();
    extend(&a.chain(), &Wallet::new().unwrap(), 10);

    let a = RunningNode::start(a);
    let b = RunningNode::start(b);
    tr_a.connect(&tr_b).unwrap();

    assert!(wait_until(|| b.chain.height() == 10));
    assert!(same_chain(&a.chain, &b.chain));

    a.stop();
    b.stop();
}

#[test]
fn test_validator_blocks_and_transactions_propagate() {
    let tr_v = LocalTransport::new("V");
    let tr_p = LocalTransport::new("P");
    let tr_q = LocalTransport::new("Q");

    let mut validator_opts = opts("V", tr_v.clone()).with_private_key(Wallet::new().unwrap());
    validator_opts.block_time = Duration::from_millis(100);
    let v = RunningNode::start(Server::new(validator_opts).unwrap());
    let p = RunningNode::start(Server::new(opts("P", tr_p.clone())).unwrap());
    let q = RunningNode::start(Server::new(opts("Q", tr_q.clone())).unwrap());

    // Q only reaches the validator through P
    tr_v.connect(&tr_p).unwrap();
    tr_p.connect(&tr_q).unwrap();
    assert!(wait_until(|| {
        v.peer_count() == 1 && p.peer_count() == 2 && q.peer_count() == 1
    }));

    let mut tx = Transaction::new(b"from q".to_vec());
    tx.sign(&Wallet::new().unwrap()).unwrap();
    q.handle.submit_transaction(tx.clone()).unwrap();

    let included = |chain: &Blockchain| {
        (1..=chain.height()).any(|h| {
            chain
                .get_block(h)
                .map(|block| block.get_transactions().contains(&tx))
                .unwrap_or(false)
        })
    };
    assert!(wait_until(|| included(&v.chain)));
    assert!(wait_until(|| included(&q.chain)));

    v.stop();
    p.stop();
    q.stop();
}

#[test]
fn test_behind_node_catches_up_over_tcp() {
    let tr_a = TcpTransport::bind("127.0.0.1:0").unwrap();
    let tr_b = TcpTransport::bind("127.0.0.1:0").unwrap();
    let a = Server::new(opts("A", tr_a.clone())).unwrap();
    let b = Server::new(opts("B", tr_b.clone())).unwrap();
    extend(&a.chain(), &Wallet::new().unwrap(), 5);

    let a = RunningNode::start(a);
    let b = RunningNode::start(b);
    tr_b.connect(&tr_a.addr()).unwrap();

    assert!(wait_until(|| b.chain.height() == 5));
    assert!(same_chain(&a.chain, &b.chain));

    a.stop();
    b.stop();
}

#[test]
fn test_catch_up_over_tcp_when_range_exceeds_reply_cap() {
    let tr_a = TcpTransport::bind("127.0.0.1:0").unwrap();
    let tr_b = TcpTransport::bind("127.0.0.1:0").unwrap();
    let mut opts_a = opts("A", tr_a.clone());
    // every reply carries a single block
    opts_a.max_reply_bytes = 1;
    let a = Server::new(opts_a).unwrap();
    let b = Server::new(opts("B", tr_b.clone())).unwrap();
    extend(&a.chain(), &Wallet::new().unwrap(), 8);

    let a = RunningNode::start(a);
    let b = RunningNode::start(b);
    tr_b.connect(&tr_a.addr()).unwrap();

    assert!(wait_until(|| b.chain.height() == 8));
    assert!(same_chain(&a.chain, &b.chain));

    a.stop();
    b.stop();
}
