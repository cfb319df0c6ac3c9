// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Internet checksum (RFC 1071)

/// Computes the one's complement of the one's complement sum of `data`,
/// read as big-endian 16-bit words. A trailing odd byte is padded with zero.
///
/// Running this over a message whose checksum field already holds the
/// result yields zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
        // Fold early so the accumulator never overflows on large buffers
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    if let [odd] = words.remainder() {
        sum += (*odd as u32) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
