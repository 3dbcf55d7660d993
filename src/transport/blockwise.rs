//! Block-wise request transfer (Block1, RFC 7959 §2.5).
//!
//! A payload of `L` bytes sent with block size `S` is cut into
//! `floor(L / S) + 1` blocks. Every block but the last spans exactly `S`
//! bytes and carries M=1; the last spans the remainder `[n*S, L)` (empty when
//! `S` divides `L`) and carries M=0.

use std::ops::Range;

use tracing::debug;

use crate::core::{CoapError, CoapResult, MAX_BLOCK_NUM, MessageExchange};
use crate::message::{BlockValue, Message, Response, next_message_id};

/// One block of a planned transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    /// Block sequence number.
    pub num: usize,
    /// Byte range within the full payload.
    pub range: Range<usize>,
    /// More blocks follow.
    pub more: bool,
}

/// Block layout for a payload of a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    len: usize,
    size: usize,
}

impl BlockPlan {
    /// Plan a transfer of `len` bytes in blocks of `size` bytes.
    ///
    /// `size` must be non-zero; block option sizes are always 16..=1024.
    pub fn new(len: usize, size: usize) -> Self {
        debug_assert!(size > 0);
        Self { len, size }
    }

    /// Sequence number of the terminal block, `floor(len / size)`.
    pub fn total_blocks(&self) -> usize {
        self.len / self.size
    }

    /// Number of blocks that will be sent.
    pub fn block_count(&self) -> usize {
        self.total_blocks() + 1
    }

    /// Span of block `num` (`num <= total_blocks()`).
    pub fn span(&self, num: usize) -> BlockSpan {
        let start = num * self.size;
        if num < self.total_blocks() {
            BlockSpan {
                num,
                range: start..start + self.size,
                more: true,
            }
        } else {
            BlockSpan {
                num,
                range: start..self.len,
                more: false,
            }
        }
    }

    /// All spans in sending order.
    pub fn spans(&self) -> impl Iterator<Item = BlockSpan> + '_ {
        (0..self.block_count()).map(|num| self.span(num))
    }
}

/// Send `message` block by block using the block size of `first`.
///
/// Fails with [`CoapError::BlockNumberOverflow`] before anything is sent if
/// the payload needs more blocks than a 20-bit NUM can address.
///
/// Blocks go out strictly in order; each waits for its send to return. The
/// first failing block aborts the transfer and its error is returned. Blocks
/// already sent are not retried. The terminal block's response is the
/// transfer's response.
pub async fn transfer<E>(
    exchange: &E,
    mut message: Message,
    first: BlockValue,
) -> CoapResult<Response>
where
    E: MessageExchange + Sync,
{
    let payload = std::mem::take(&mut message.payload);
    let plan = BlockPlan::new(payload.len(), first.size());
    let last = u32::try_from(plan.total_blocks()).unwrap_or(u32::MAX);
    if last > MAX_BLOCK_NUM {
        return Err(CoapError::BlockNumberOverflow(last));
    }
    debug!(
        "block-wise transfer of {} bytes in {} blocks of {}",
        payload.len(),
        plan.block_count(),
        first.size()
    );

    for num in 0..plan.total_blocks() {
        let span = plan.span(num);
        let block_num = span.num as u32;
        let response = send_block(exchange, &message, &payload, span, first.szx).await?;
        if response.code().is_error() {
            return Err(CoapError::BlockRejected {
                num: block_num,
                code: response.code(),
            });
        }
    }

    let terminal = plan.span(plan.total_blocks());
    send_block(exchange, &message, &payload, terminal, first.szx).await
}

/// Rewrite `template` for one block and send it.
async fn send_block<E>(
    exchange: &E,
    template: &Message,
    payload: &[u8],
    span: BlockSpan,
    szx: u8,
) -> CoapResult<Response>
where
    E: MessageExchange + Sync,
{
    let num = u32::try_from(span.num).map_err(|_| CoapError::BlockNumberOverflow(u32::MAX))?;
    let block = BlockValue::new(num, span.more, szx).ok_or(CoapError::BlockNumberOverflow(num))?;

    let mut message = template.clone();
    message.set_block1(block);
    message.message_id = next_message_id();
    message.payload = payload[span.range].to_vec();

    debug!(
        "sending block {} ({} bytes, more={}) as message {}",
        num,
        message.payload.len(),
        span.more,
        message.message_id
    );
    exchange.send_message(message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Code, MessageType};
    use parking_lot::Mutex;

    /// Records every block and fails (or rejects) at a chosen index.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Message>>,
        fail_at: Option<usize>,
        reject_at: Option<usize>,
    }

    impl MessageExchange for Recorder {
        async fn send_message(&self, message: Message) -> CoapResult<Response> {
            let index = {
                let mut sent = self.sent.lock();
                sent.push(message.clone());
                sent.len() - 1
            };
            if self.fail_at == Some(index) {
                return Err(CoapError::Timeout);
            }
            let code = if self.reject_at == Some(index) {
                Code::REQUEST_ENTITY_TOO_LARGE
            } else if message.block1().unwrap().unwrap().unwrap().more {
                Code::CONTINUE
            } else {
                Code::CHANGED
            };
            Ok(Response::new(Message::new(
                MessageType::Acknowledgement,
                code,
                message.message_id,
            )))
        }
    }

    fn request(payload: Vec<u8>) -> Message {
        let mut msg = Message::new(MessageType::Confirmable, Code::PUT, 1);
        msg.payload = payload;
        msg
    }

    fn reconstruct(plan: &BlockPlan, payload: &[u8]) -> Vec<u8> {
        plan.spans()
            .flat_map(|span| payload[span.range].to_vec())
            .collect()
    }

    #[test]
    fn test_plan_reconstructs_payload() {
        let cases = [
            (0, 16),
            (1, 16),
            (15, 16),
            (16, 16),
            (17, 16),
            (100, 32),
            (1024, 1024),
            (5000, 512),
        ];
        for (len, size) in cases {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let plan = BlockPlan::new(len, size);

            assert_eq!(plan.block_count(), len / size + 1);
            assert_eq!(reconstruct(&plan, &payload), payload);

            // Contiguous, no overlap
            let mut expected_start = 0;
            for span in plan.spans() {
                assert_eq!(span.range.start, expected_start);
                expected_start = span.range.end;
            }
            assert_eq!(expected_start, len);
        }
    }

    #[test]
    fn test_plan_more_flags() {
        let plan = BlockPlan::new(40, 16);
        let spans: Vec<BlockSpan> = plan.spans().collect();
        assert_eq!(spans.len(), 3);
        assert!(spans[0].more && spans[1].more);
        assert!(!spans[2].more);
        assert_eq!(spans[2].range, 32..40);
    }

    #[test]
    fn test_plan_exact_multiple_has_empty_terminal_block() {
        let plan = BlockPlan::new(64, 32);
        let last = plan.span(plan.total_blocks());
        assert_eq!(last.num, 2);
        assert!(last.range.is_empty());
        assert!(!last.more);
    }

    #[tokio::test]
    async fn test_transfer_sends_all_blocks_in_order() {
        let payload: Vec<u8> = (0..100u8).collect();
        let recorder = Recorder::default();
        let first = BlockValue::new(0, false, 1).unwrap(); // 32-byte blocks

        let response = transfer(&recorder, request(payload.clone()), first).await.unwrap();
        assert_eq!(response.code(), Code::CHANGED);

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 4);
        let mut rebuilt = Vec::new();
        for (i, msg) in sent.iter().enumerate() {
            let block = msg.block1().unwrap().unwrap().unwrap();
            assert_eq!(block.num as usize, i);
            assert_eq!(block.size(), 32);
            assert_eq!(block.more, i < 3);
            rebuilt.extend_from_slice(&msg.payload);
        }
        assert_eq!(rebuilt, payload);
    }

    #[tokio::test]
    async fn test_transfer_assigns_fresh_message_ids() {
        let recorder = Recorder::default();
        let first = BlockValue::new(0, false, 0).unwrap();
        transfer(&recorder, request(vec![7; 50]), first).await.unwrap();

        let sent = recorder.sent.lock();
        let mut ids: Vec<u16> = sent.iter().map(|m| m.message_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sent.len());
        assert!(sent.iter().all(|m| m.message_type == MessageType::Confirmable));
    }

    #[tokio::test]
    async fn test_transfer_aborts_at_failing_block() {
        for k in 0..4 {
            let recorder = Recorder {
                fail_at: Some(k),
                ..Default::default()
            };
            let first = BlockValue::new(0, false, 0).unwrap();
            let err = transfer(&recorder, request(vec![1; 60]), first).await.unwrap_err();

            assert!(matches!(err, CoapError::Timeout));
            assert_eq!(recorder.sent.lock().len(), k + 1);
        }
    }

    #[tokio::test]
    async fn test_transfer_aborts_on_rejected_block() {
        let recorder = Recorder {
            reject_at: Some(1),
            ..Default::default()
        };
        let first = BlockValue::new(0, false, 0).unwrap();
        let err = transfer(&recorder, request(vec![1; 60]), first).await.unwrap_err();

        assert!(matches!(
            err,
            CoapError::BlockRejected { num: 1, code } if code == Code::REQUEST_ENTITY_TOO_LARGE
        ));
        assert_eq!(recorder.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_transfer_rejects_too_many_blocks_up_front() {
        let recorder = Recorder::default();
        let first = BlockValue::new(0, false, 0).unwrap(); // 16-byte blocks
        let payload = vec![0u8; 16 * (MAX_BLOCK_NUM as usize + 1)];

        let err = transfer(&recorder, request(payload), first).await.unwrap_err();
        assert!(matches!(err, CoapError::BlockNumberOverflow(n) if n == MAX_BLOCK_NUM + 1));
        assert!(recorder.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_of_empty_payload() {
        let recorder = Recorder::default();
        let first = BlockValue::new(0, false, 2).unwrap();
        transfer(&recorder, request(Vec::new()), first).await.unwrap();

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].payload.is_empty());
        assert!(!sent[0].block1().unwrap().unwrap().unwrap().more);
    }
}
