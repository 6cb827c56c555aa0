use crate::ffi::bindings as b;

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1286
// u64 (little-endian):
// mem_op        0-4  5 bits, type of opcode
// mem_lvl      5-18 14 bits, memory hierarchy level
// mem_snoop   19-23  5 bits, snoop mode
// mem_lock    24-25  2 bits, lock instr
// mem_dtlb    26-32  7 bits, tlb access
// mem_lvl_num 33-36  4 bits, memory hierarchy level number
// mem_remote     37  1 bit,  remote
// mem_snoopx  38-39  2 bits, snoop mode, ext
// mem_blk     40-42  3 bits, access blocked
// mem_hops    43-45  3 bits, hop level
// mem_rsvd    46-63 18 bits, reserved

/// Bit range of one sub-field.
struct Field {
    shift: u64,
    mask: u64,
}

impl Field {
    const fn new(shift: u64, width: u32) -> Self {
        Self {
            shift,
            mask: (1 << width) - 1,
        }
    }

    const fn get(&self, bits: u64) -> u64 {
        (bits >> self.shift) & self.mask
    }
}

const OP: Field = Field::new(b::PERF_MEM_OP_SHIFT, 5);
const LVL: Field = Field::new(b::PERF_MEM_LVL_SHIFT, 14);
const SNOOP: Field = Field::new(b::PERF_MEM_SNOOP_SHIFT, 5);
const LOCK: Field = Field::new(b::PERF_MEM_LOCK_SHIFT, 2);
const TLB: Field = Field::new(b::PERF_MEM_TLB_SHIFT, 7);
const LVL_NUM: Field = Field::new(b::PERF_MEM_LVLNUM_SHIFT, 4);
const REMOTE: Field = Field::new(b::PERF_MEM_REMOTE_SHIFT, 1);
const SNOOPX: Field = Field::new(b::PERF_MEM_SNOOPX_SHIFT, 2);
const BLK: Field = Field::new(b::PERF_MEM_BLK_SHIFT, 3);
const HOPS: Field = Field::new(b::PERF_MEM_HOPS_SHIFT, 3);

/// The source of data associated with the sampled instruction.
///
/// A read-only view over the packed `perf_mem_data_src` word. Every predicate
/// is a pure function of the raw value; reserved or unknown encodings simply
/// answer `false`.
///
/// Not every CPU fills every sub-field: Intel reports the memory level through
/// [`lvl_num`][Self::lvl_num] on recent kernels, AMD IBS additionally fills
/// [`hops`][Self::hops].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSource(u64);

macro_rules! flag {
    ($(#[$doc:meta])* $name:ident, $field:ident, $flag:ident) => {
        $(#[$doc])*
        pub fn $name(&self) -> bool {
            self.$field() & b::$flag > 0
        }
    };
}

macro_rules! equals {
    ($(#[$doc:meta])* $name:ident, $field:ident, $val:ident) => {
        $(#[$doc])*
        pub fn $name(&self) -> bool {
            self.$field() == b::$val
        }
    };
}

impl DataSource {
    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// The packed value as written by the kernel.
    pub fn bits(&self) -> u64 {
        self.0
    }

    // raw sub-fields

    /// Type of opcode (`mem_op`).
    pub fn op(&self) -> u64 {
        OP.get(self.0)
    }

    /// Memory hierarchy level (`mem_lvl`), deprecated in favour of [`lvl_num`][Self::lvl_num].
    pub fn lvl(&self) -> u64 {
        LVL.get(self.0)
    }

    /// Snoop mode (`mem_snoop`).
    pub fn snoop(&self) -> u64 {
        SNOOP.get(self.0)
    }

    /// Lock instruction (`mem_lock`).
    pub fn lock(&self) -> u64 {
        LOCK.get(self.0)
    }

    /// TLB access (`mem_dtlb`).
    pub fn tlb(&self) -> u64 {
        TLB.get(self.0)
    }

    /// Memory hierarchy level number (`mem_lvl_num`).
    pub fn lvl_num(&self) -> u64 {
        LVL_NUM.get(self.0)
    }

    /// Remote flag (`mem_remote`).
    pub fn remote(&self) -> u64 {
        REMOTE.get(self.0)
    }

    /// Extended snoop mode (`mem_snoopx`).
    pub fn snoopx(&self) -> u64 {
        SNOOPX.get(self.0)
    }

    /// Access blocked (`mem_blk`).
    pub fn blk(&self) -> u64 {
        BLK.get(self.0)
    }

    /// Hop level (`mem_hops`).
    pub fn hops(&self) -> u64 {
        HOPS.get(self.0)
    }

    // mem_op

    flag!(
        /// Operation type not available.
        is_na, op, PERF_MEM_OP_NA
    );
    flag!(is_load, op, PERF_MEM_OP_LOAD);
    flag!(is_store, op, PERF_MEM_OP_STORE);
    flag!(is_prefetch, op, PERF_MEM_OP_PFETCH);
    flag!(
        /// Code execution.
        is_exec, op, PERF_MEM_OP_EXEC
    );

    // mem_lvl

    flag!(
        /// The access hit the level reported by [`lvl`][Self::lvl].
        is_mem_hit, lvl, PERF_MEM_LVL_HIT
    );
    flag!(is_mem_miss, lvl, PERF_MEM_LVL_MISS);
    flag!(
        /// Found in a remote cache, one hop away.
        is_mem_remote_cce1, lvl, PERF_MEM_LVL_REM_CCE1
    );
    flag!(
        /// Found in a remote cache, two hops away.
        is_mem_remote_cce2, lvl, PERF_MEM_LVL_REM_CCE2
    );

    // mem_lvl_num

    equals!(is_mem_l1, lvl_num, PERF_MEM_LVLNUM_L1);
    equals!(
        /// Line fill buffer (miss address buffer on AMD).
        is_mem_lfb, lvl_num, PERF_MEM_LVLNUM_LFB
    );
    equals!(is_mem_l2, lvl_num, PERF_MEM_LVLNUM_L2);
    equals!(is_mem_l3, lvl_num, PERF_MEM_LVLNUM_L3);
    equals!(is_mem_l4, lvl_num, PERF_MEM_LVLNUM_L4);
    equals!(is_mem_any_cache, lvl_num, PERF_MEM_LVLNUM_ANY_CACHE);
    equals!(is_mem_ram, lvl_num, PERF_MEM_LVLNUM_RAM);
    equals!(
        /// Persistent memory.
        is_pmem, lvl_num, PERF_MEM_LVLNUM_PMEM
    );
    equals!(
        /// Transferred via Compute Express Link.
        is_cxl, lvl_num, PERF_MEM_LVLNUM_CXL
    );
    equals!(is_io, lvl_num, PERF_MEM_LVLNUM_IO);

    // mem_remote

    equals!(is_remote, remote, PERF_MEM_REMOTE_REMOTE);

    /// Found in the local RAM.
    pub fn is_mem_local_ram(&self) -> bool {
        self.is_mem_ram() && !self.is_remote()
    }

    /// Found in any remote RAM.
    pub fn is_mem_remote_ram(&self) -> bool {
        self.is_mem_ram() && self.is_remote()
    }

    // mem_hops

    equals!(
        /// Remote core, same node.
        is_mem_hops0, hops, PERF_MEM_HOPS_0
    );
    equals!(
        /// Remote node, same socket.
        is_mem_hops1, hops, PERF_MEM_HOPS_1
    );
    equals!(
        /// Remote socket, same board.
        is_mem_hops2, hops, PERF_MEM_HOPS_2
    );
    equals!(
        /// Remote board.
        is_mem_hops3, hops, PERF_MEM_HOPS_3
    );

    pub fn is_mem_remote_ram1(&self) -> bool {
        self.is_mem_remote_ram() && self.is_mem_hops1()
    }

    pub fn is_mem_remote_ram2(&self) -> bool {
        self.is_mem_remote_ram() && self.is_mem_hops2()
    }

    pub fn is_mem_remote_ram3(&self) -> bool {
        self.is_mem_remote_ram() && self.is_mem_hops3()
    }

    // mem_dtlb

    flag!(is_tlb_na, tlb, PERF_MEM_TLB_NA);
    flag!(is_tlb_hit, tlb, PERF_MEM_TLB_HIT);
    flag!(is_tlb_miss, tlb, PERF_MEM_TLB_MISS);
    flag!(
        /// Associated with the first level (dTLB).
        is_tlb_l1, tlb, PERF_MEM_TLB_L1
    );
    flag!(
        /// Associated with the second level (STLB).
        is_tlb_l2, tlb, PERF_MEM_TLB_L2
    );
    flag!(
        /// Resolved by the hardware page walker.
        is_tlb_walk, tlb, PERF_MEM_TLB_WK
    );
    flag!(
        /// Resolved by the OS fault handler.
        is_tlb_fault, tlb, PERF_MEM_TLB_OS
    );

    // mem_lock

    flag!(is_lock_na, lock, PERF_MEM_LOCK_NA);
    flag!(
        /// Accessed by a locked instruction.
        is_locked, lock, PERF_MEM_LOCK_LOCKED
    );

    // mem_blk

    flag!(is_block_na, blk, PERF_MEM_BLK_NA);
    flag!(
        /// Data could not be forwarded.
        is_data_blocked, blk, PERF_MEM_BLK_DATA
    );
    flag!(
        /// Address conflict.
        is_address_blocked, blk, PERF_MEM_BLK_ADDR
    );

    // mem_snoop, mem_snoopx

    flag!(is_snoop_na, snoop, PERF_MEM_SNOOP_NA);
    flag!(is_snoop_none, snoop, PERF_MEM_SNOOP_NONE);
    flag!(is_snoop_hit, snoop, PERF_MEM_SNOOP_HIT);
    flag!(is_snoop_miss, snoop, PERF_MEM_SNOOP_MISS);
    flag!(
        /// Snoop hit a modified line.
        is_snoop_hit_modified, snoop, PERF_MEM_SNOOP_HITM
    );
    flag!(is_snoop_forward, snoopx, PERF_MEM_SNOOPX_FWD);
    flag!(
        /// Transferred from a peer cache.
        is_snoop_peer, snoopx, PERF_MEM_SNOOPX_PEER
    );
}

impl From<u64> for DataSource {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("bits", &format_args!("{:#x}", self.0))
            .field("op", &self.op())
            .field("lvl", &self.lvl())
            .field("lvl_num", &self.lvl_num())
            .field("remote", &self.remote())
            .field("hops", &self.hops())
            .field("tlb", &self.tlb())
            .field("snoop", &self.snoop())
            .finish()
    }
}
