//! Wire messages exchanged between nodes.
//!
//! Every message is one kind tag byte followed by the kind's payload. Transactions
//! and blocks go through the node's [`Codec`]; the small control messages use a
//! fixed little-endian layout.

use crate::core::{Block, Codec, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::transport::Rpc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Tx = 0x1,
    Block = 0x2,
    GetStatus = 0x3,
    Status = 0x4,
    GetBlocks = 0x5,
    Blocks = 0x6,
}

impl TryFrom<u8> for MessageType {
    type Error = BlockchainError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x1 => Ok(MessageType::Tx),
            0x2 => Ok(MessageType::Block),
            0x3 => Ok(MessageType::GetStatus),
            0x4 => Ok(MessageType::Status),
            0x5 => Ok(MessageType::GetBlocks),
            0x6 => Ok(MessageType::Blocks),
            other => Err(BlockchainError::UnknownMessageType(other)),
        }
    }
}

/// Tagged frame as it travels through a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageType,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(header: MessageType, data: Vec<u8>) -> Message {
        Message { header, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 1);
        out.push(self.header as u8);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Message> {
        let (tag, data) = bytes
            .split_first()
            .ok_or_else(|| BlockchainError::Decode("Empty message".to_string()))?;
        Ok(Message {
            header: MessageType::try_from(*tag)?,
            data: data.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetStatusMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub id: String,
    pub current_height: u32,
}

/// `to == 0` asks for everything through the responder's tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocksMessage {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksMessage {
    pub blocks: Vec<Block>,
}

/// One case per message kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Transaction(Transaction),
    Block(Block),
    GetStatus(GetStatusMessage),
    Status(StatusMessage),
    GetBlocks(GetBlocksMessage),
    Blocks(BlocksMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub from: String,
    pub data: Payload,
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Transaction(_) => MessageType::Tx,
            Payload::Block(_) => MessageType::Block,
            Payload::GetStatus(_) => MessageType::GetStatus,
            Payload::Status(_) => MessageType::Status,
            Payload::GetBlocks(_) => MessageType::GetBlocks,
            Payload::Blocks(_) => MessageType::Blocks,
        }
    }

    pub fn encode(&self, codec: &dyn Codec) -> Result<Message> {
        let data = match self {
            Payload::Transaction(tx) => codec.encode_transaction(tx)?,
            Payload::Block(block) => codec.encode_block(block)?,
            Payload::GetStatus(_) => vec![],
            Payload::Status(status) => {
                let mut out = status.current_height.to_le_bytes().to_vec();
                out.extend_from_slice(status.id.as_bytes());
                out
            }
            Payload::GetBlocks(req) => {
                let mut out = req.from.to_le_bytes().to_vec();
                out.extend_from_slice(&req.to.to_le_bytes());
                out
            }
            Payload::Blocks(msg) => {
                let mut out = length_prefix(msg.blocks.len())?.to_vec();
                for block in &msg.blocks {
                    let encoded = codec.encode_block(block)?;
                    out.extend_from_slice(&length_prefix(encoded.len())?);
                    out.extend(encoded);
                }
                out
            }
        };
        Ok(Message::new(self.message_type(), data))
    }

    pub fn decode(message: &Message, codec: &dyn Codec) -> Result<Payload> {
        let mut reader = Reader::new(&message.data);
        let payload = match message.header {
            MessageType::Tx => Payload::Transaction(codec.decode_transaction(reader.rest())?),
            MessageType::Block => Payload::Block(codec.decode_block(reader.rest())?),
            MessageType::GetStatus => Payload::GetStatus(GetStatusMessage),
            MessageType::Status => {
                let current_height = reader.u32()?;
                let id = String::from_utf8(reader.rest().to_vec())
                    .map_err(|e| BlockchainError::Decode(format!("Invalid status id: {e}")))?;
                Payload::Status(StatusMessage { id, current_height })
            }
            MessageType::GetBlocks => Payload::GetBlocks(GetBlocksMessage {
                from: reader.u32()?,
                to: reader.u32()?,
            }),
            MessageType::Blocks => {
                let count = reader.u32()?;
                let mut blocks = Vec::new();
                for _ in 0..count {
                    let len = reader.u32()? as usize;
                    blocks.push(codec.decode_block(reader.take(len)?)?);
                }
                Payload::Blocks(BlocksMessage { blocks })
            }
        };
        reader.finish()?;
        Ok(payload)
    }
}

fn length_prefix(len: usize) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| BlockchainError::Serialization(format!("Length {len} does not fit in u32")))
}

/// Decodes a raw transport payload into the sender and its typed message.
pub fn decode_message(rpc: &Rpc, codec: &dyn Codec) -> Result<DecodedMessage> {
    let message = Message::from_bytes(&rpc.payload)?;
    Ok(DecodedMessage {
        from: rpc.from.clone(),
        data: Payload::decode(&message, codec)?,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(BlockchainError::Decode(format!(
                "Need {len} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    fn finish(self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(BlockchainError::Decode(format!(
                "{} trailing bytes after payload",
                self.buf.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BincodeCodec, Hash, Header};
    use crate::utils::serialize;
    use crate::testnet::test_utils::{new_blockchain_with_genesis, next_block, random_tx};
    use crate::wallet::Wallet;

    fn rpc(payload: &Payload) -> Rpc {
        let bytes = payload.encode(&BincodeCodec).unwrap().to_bytes();
        Rpc::new("peer".to_string(), bytes)
    }

    #[test]
    fn test_kind_tag_leads_the_frame() {
        let bytes = Payload::GetStatus(GetStatusMessage)
            .encode(&BincodeCodec)
            .unwrap()
            .to_bytes();
        assert_eq!(bytes, vec![0x3]);

        let tx_frame = Payload::Transaction(random_tx())
            .encode(&BincodeCodec)
            .unwrap()
            .to_bytes();
        assert_eq!(tx_frame[0], 0x1);
    }

    #[test]
    fn test_decode_control_messages() {
        let cases = vec![
            Payload::GetStatus(GetStatusMessage),
            Payload::Status(StatusMessage {
                id: "node-a".to_string(),
                current_height: 10,
            }),
            Payload::GetBlocks(GetBlocksMessage { from: 1, to: 0 }),
        ];

        for payload in cases {
            let decoded = decode_message(&rpc(&payload), &BincodeCodec).unwrap();
            assert_eq!(decoded.from, "peer");
            assert_eq!(decoded.data, payload);
        }
    }

    #[test]
    fn test_decode_blocks_message_keeps_order() {
        let chain = new_blockchain_with_genesis();
        let wallet = Wallet::new().unwrap();
        let mut blocks = vec![];
        for _ in 0..3 {
            let block = next_block(&chain, &wallet, vec![random_tx()]);
            chain.add_block(&block).unwrap();
            blocks.push(block);
        }

        let payload = Payload::Blocks(BlocksMessage { blocks });
        let decoded = decode_message(&rpc(&payload), &BincodeCodec).unwrap();
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let rpc = Rpc::new("peer".to_string(), vec![0x9, 1, 2, 3]);
        assert_eq!(
            decode_message(&rpc, &BincodeCodec),
            Err(BlockchainError::UnknownMessageType(0x9))
        );
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let empty = Rpc::new("peer".to_string(), vec![]);
        assert!(decode_message(&empty, &BincodeCodec).is_err());

        // GetBlocks needs eight bytes
        let short = Rpc::new("peer".to_string(), vec![0x5, 1, 0, 0]);
        assert!(decode_message(&short, &BincodeCodec).is_err());

        // Block count says two, only the length of one follows
        let truncated = Rpc::new("peer".to_string(), vec![0x6, 2, 0, 0, 0, 50, 0, 0, 0]);
        assert!(decode_message(&truncated, &BincodeCodec).is_err());

        let trailing = Rpc::new("peer".to_string(), vec![0x3, 0xff]);
        assert!(decode_message(&trailing, &BincodeCodec).is_err());
    }

    #[test]
    fn test_huge_declared_length_is_an_error() {
        // Tx whose payload claims 2^62 bytes
        let mut bytes = vec![0x1, 0xFD];
        bytes.extend_from_slice(&(1u64 << 62).to_le_bytes());
        let rpc = Rpc::new("peer".to_string(), bytes);

        assert!(matches!(
            decode_message(&rpc, &BincodeCodec),
            Err(BlockchainError::Serialization(_))
        ));

        // The same claim on the transaction list of a block inside a Blocks batch
        let mut block = serialize(&Header::new(1, Hash::zero(), 0, 1, 0)).unwrap();
        block.push(0xFD);
        block.extend_from_slice(&(1u64 << 62).to_le_bytes());
        let mut bytes = vec![0x6, 1, 0, 0, 0];
        bytes.extend_from_slice(&length_prefix(block.len()).unwrap());
        bytes.extend(block);

        assert!(matches!(
            decode_message(&Rpc::new("peer".to_string(), bytes), &BincodeCodec),
            Err(BlockchainError::Serialization(_))
        ));
    }

    #[test]
    fn test_length_prefix() {
        assert_eq!(length_prefix(7).unwrap(), [7, 0, 0, 0]);
        assert_eq!(length_prefix(u32::MAX as usize).unwrap(), [0xff; 4]);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            length_prefix(u32::MAX as usize + 1),
            Err(BlockchainError::Serialization(_))
        ));
    }
}
