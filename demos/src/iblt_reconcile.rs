// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.


use probsketch::iblt::IbltSnapshot;
use probsketch::iblt::InvertibleBloomTable;

fn main() {
    println!("=== Set reconciliation with an invertible Bloom lookup table ===\n");

    // Alice and Bob each hold ~1000 keys and differ in a handful of them.
    let mut alice = InvertibleBloomTable::builder()
        .with_capacity(20)
        .build()
        .unwrap();
    let mut bob = InvertibleBloomTable::builder()
        .with_capacity(20)
        .build()
        .unwrap();
    println!(
        "Table: {} cells, {} hashes, seed {}",
        alice.num_cells(),
        alice.num_hashes(),
        alice.seed()
    );

    for i in 0..1_000 {
        alice.insert(format!("key-{i}"));
        bob.insert(format!("key-{i}"));
    }
    for i in 0..5 {
        alice.insert(format!("alice-{i}"));
    }
    for i in 0..3 {
        bob.insert(format!("bob-{i}"));
    }
    println!("Alice holds {} keys, Bob holds {} keys", alice.len(), bob.len());

    // Bob ships his table to Alice as a JSON snapshot.
    let json = bob.to_snapshot().to_json().unwrap();
    println!("\nBob's snapshot: {} bytes of JSON", json.len());
    println!("Bob's table: {} bytes in binary form", bob.serialize().len());

    let received = InvertibleBloomTable::from_snapshot(IbltSnapshot::from_json(&json).unwrap())
        .unwrap();
    let result = alice.subtract(&received).unwrap().decode();

    println!("\nDecode status: {:?}", result.status());
    for item in &result.additional {
        println!("  only Alice has: {}", String::from_utf8_lossy(item));
    }
    for item in &result.missing {
        println!("  only Bob has:   {}", String::from_utf8_lossy(item));
    }

    // A table sized far below the difference cannot be fully decoded.
    println!("\nRetrying with a table that is too small...");
    let mut small_alice = InvertibleBloomTable::builder()
        .with_size(6, 3)
        .build()
        .unwrap();
    let mut small_bob = small_alice.clone();
    for i in 0..100 {
        small_alice.insert(format!("alice-{i}"));
        small_bob.insert(format!("bob-{i}"));
    }
    let result = small_alice.subtract(&small_bob).unwrap().decode();
    println!("Decode status: {:?}", result.status());
    println!(
        "Recovered {} + {} elements, {} cells left undecoded",
        result.additional.len(),
        result.missing.len(),
        result.residual.len()
    );
}
